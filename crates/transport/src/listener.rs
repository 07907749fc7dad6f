// crates/transport/src/listener.rs
use std::io;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::tcp::TcpTransport;
use crate::udp::DatagramTransport;
use crate::{Address, ServerConfig, ServerError, Transport, TransportKind};

/// The bound, listening socket owned by a [`crate::Server`].
///
/// Non-blocking so that several processes sharing it after a fork can race
/// for the same connection without the losers hanging in `accept`.
#[derive(Debug)]
pub(crate) enum Listener {
    Stream(TcpListener),
    Datagram(UdpSocket),
}

pub(crate) enum Request<'a> {
    Stream(TcpTransport, SocketAddr),
    Datagram(DatagramTransport<'a>),
}

impl Request<'_> {
    pub(crate) fn peer(&self) -> SocketAddr {
        match self {
            Request::Stream(_, peer) => *peer,
            Request::Datagram(t) => t.peer_addr(),
        }
    }

    pub(crate) fn transport(&mut self) -> &mut dyn Transport {
        match self {
            Request::Stream(t, _) => t,
            Request::Datagram(t) => t,
        }
    }

    pub(crate) fn finish(mut self) -> io::Result<()> {
        match &mut self {
            Request::Stream(t, _) => {
                t.finish();
                Ok(())
            }
            Request::Datagram(t) => t.finish(),
        }
    }
}

impl Listener {
    pub fn bind(
        address: &Address,
        kind: TransportKind,
        cfg: &ServerConfig,
    ) -> Result<Self, ServerError> {
        let addr = address.resolve().map_err(|source| ServerError::Resolve {
            address: address.clone(),
            source,
        })?;
        let socket_err = |source| ServerError::Socket {
            address: address.clone(),
            source,
        };

        let (ty, proto) = match kind {
            TransportKind::Stream => (Type::STREAM, Protocol::TCP),
            TransportKind::Datagram => (Type::DGRAM, Protocol::UDP),
        };
        let socket = Socket::new(Domain::for_address(addr), ty, Some(proto)).map_err(socket_err)?;
        if cfg.allow_reuse_address {
            socket.set_reuse_address(true).map_err(socket_err)?;
        }
        if addr.is_ipv6() {
            if cfg.ipv6_only {
                socket.set_only_v6(true).map_err(socket_err)?;
            } else if let Err(err) = socket.set_only_v6(false) {
                debug!(%address, %err, "could not clear IPV6_V6ONLY");
            }
        }
        socket
            .bind(&addr.into())
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        if kind == TransportKind::Stream {
            socket.listen(cfg.backlog).map_err(socket_err)?;
        }
        socket.set_nonblocking(true).map_err(socket_err)?;

        Ok(match kind {
            TransportKind::Stream => Listener::Stream(socket.into()),
            TransportKind::Datagram => Listener::Datagram(socket.into()),
        })
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Listener::Stream(_) => TransportKind::Stream,
            Listener::Datagram(_) => TransportKind::Datagram,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Listener::Stream(l) => l.local_addr(),
            Listener::Datagram(s) => s.local_addr(),
        }
    }

    fn fd(&self) -> BorrowedFd<'_> {
        match self {
            Listener::Stream(l) => l.as_fd(),
            Listener::Datagram(s) => s.as_fd(),
        }
    }

    /// Wait up to `timeout` for the socket to become readable.
    ///
    /// An interrupted wait reports "not ready" so the caller simply loops.
    pub fn poll_readable(&self, timeout: Duration) -> io::Result<bool> {
        let millis = timeout.as_millis().min(u128::from(u16::MAX)) as u16;
        let mut fds = [PollFd::new(self.fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    /// Take the next pending connection or datagram, if another process
    /// sharing the socket has not already taken it.
    pub(crate) fn next_request<'a>(&'a self, buf: &'a mut [u8]) -> io::Result<Option<Request<'a>>> {
        match self {
            Listener::Stream(l) => match l.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    Ok(Some(Request::Stream(TcpTransport::from_stream(stream), peer)))
                }
                Err(e) if is_transient(&e) => Ok(None),
                Err(e) => Err(e),
            },
            Listener::Datagram(s) => match s.recv_from(buf) {
                Ok((n, peer)) => Ok(Some(Request::Datagram(DatagramTransport::new(
                    s,
                    &buf[..n],
                    peer,
                )))),
                Err(e) if is_transient(&e) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
