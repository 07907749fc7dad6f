use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::Transport;

/// One received datagram presented as a request.
///
/// `receive` drains the packet; whatever the handler sends is buffered and
/// returned to the peer as a single reply datagram when the request is
/// finished. An empty reply sends nothing.
pub struct DatagramTransport<'a> {
    socket: &'a UdpSocket,
    data: &'a [u8],
    pos: usize,
    reply: Vec<u8>,
    peer: SocketAddr,
}

impl<'a> DatagramTransport<'a> {
    pub fn new(socket: &'a UdpSocket, data: &'a [u8], peer: SocketAddr) -> Self {
        Self {
            socket,
            data,
            pos: 0,
            reply: Vec::new(),
            peer,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn pending_reply(&self) -> &[u8] {
        &self.reply
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        if self.reply.is_empty() {
            return Ok(());
        }
        self.socket.send_to(&self.reply, self.peer)?;
        self.reply.clear();
        Ok(())
    }
}

impl Transport for DatagramTransport<'_> {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.reply.extend_from_slice(data);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}
