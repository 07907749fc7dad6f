// crates/transport/src/server.rs
use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, trace, warn};

use crate::listener::{Listener, Request};
use crate::{Address, RequestError, ServerConfig, ServerError, Transport, TransportKind};

/// Per-request handling plugged into a [`Server`].
pub trait Service: Send + Sync {
    /// Serve one accepted connection or one received datagram.
    fn handle(&self, transport: &mut dyn Transport, peer: SocketAddr) -> io::Result<()>;

    /// Called once before the socket is bound and again on every reload.
    fn load_config(&self) -> io::Result<()> {
        Ok(())
    }

    fn handle_error(&self, peer: SocketAddr, err: &RequestError) {
        error!(%peer, error = %err, "request failed");
    }
}

/// A single-process listener dispatching each request to a [`Service`].
pub struct Server {
    address: Address,
    listener: Listener,
    service: Arc<dyn Service>,
    config: ServerConfig,
    shutdown: AtomicBool,
}

impl Server {
    pub fn bind(
        address: Address,
        kind: TransportKind,
        config: ServerConfig,
        service: Arc<dyn Service>,
    ) -> Result<Self, ServerError> {
        service.load_config().map_err(ServerError::Config)?;
        let listener = Listener::bind(&address, kind, &config)?;
        match listener.local_addr() {
            Ok(local) => debug!(%address, %local, ?kind, "listening"),
            Err(err) => debug!(%address, %err, ?kind, "listening"),
        }
        Ok(Self {
            address,
            listener,
            service,
            config,
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.listener.kind()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and dispatch requests until [`Server::shutdown`] is called.
    pub fn serve_forever(&self) -> io::Result<()> {
        let mut buf = vec![0u8; self.config.max_packet_size];
        while !self.is_shutdown() {
            if !self.listener.poll_readable(self.config.poll_interval)? {
                continue;
            }
            if self.is_shutdown() {
                break;
            }
            match self.listener.next_request(&mut buf) {
                Ok(Some(req)) => self.process_request(req),
                Ok(None) => {}
                Err(err) => debug!(%err, "accept failed"),
            }
        }
        debug!(address = %self.address, "serve loop stopped");
        Ok(())
    }

    fn process_request(&self, mut req: Request<'_>) {
        let peer = req.peer();
        trace!(%peer, "request");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.service.handle(req.transport(), peer)
        }));
        let result = match outcome {
            Ok(Ok(())) => req.finish().map_err(RequestError::from),
            Ok(Err(err)) => Err(RequestError::Io(err)),
            Err(payload) => Err(RequestError::Panic(panic_message(payload.as_ref()))),
        };
        if let Err(err) = result {
            self.service.handle_error(peer, &err);
        }
    }

    /// Stop the accept loop. Safe from any thread; repeated calls are no-ops.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!(address = %self.address, "shutdown requested");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Re-run the service's configuration hook, keeping the previous
    /// configuration when it fails.
    pub fn load_config(&self) -> io::Result<()> {
        match self.service.load_config() {
            Ok(()) => {
                info!(address = %self.address, "configuration reloaded");
                Ok(())
            }
            Err(err) => {
                warn!(address = %self.address, %err, "configuration reload failed");
                Err(err)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
