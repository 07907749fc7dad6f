// crates/daemon/src/lifecycle.rs
use std::io;

use transport::Server;

/// The control surface shared by a bare [`Server`] and a
/// [`crate::WorkerPool`], so signal handling and daemonization work on
/// either.
pub trait Lifecycle: Send + Sync {
    /// Run until [`Lifecycle::shutdown`] is called.
    fn serve_forever(&self) -> io::Result<()>;

    fn shutdown(&self);

    fn load_config(&self) -> io::Result<()>;
}

impl Lifecycle for Server {
    fn serve_forever(&self) -> io::Result<()> {
        Server::serve_forever(self)
    }

    fn shutdown(&self) {
        Server::shutdown(self)
    }

    fn load_config(&self) -> io::Result<()> {
        Server::load_config(self)
    }
}
