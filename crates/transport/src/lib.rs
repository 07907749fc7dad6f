// crates/transport/src/lib.rs
use std::io::{self, Read, Write};

mod address;
mod config;
mod error;
mod listener;
mod server;
pub mod tcp;
pub mod udp;

pub use address::{Address, AddressFamily};
pub use config::{ServerConfig, ServerConfigBuilder, ServerConfigError};
pub use error::{RequestError, ServerError};
pub use server::{Server, Service};
pub use tcp::TcpTransport;
pub use udp::DatagramTransport;

/// How a listening socket receives work: accepted connections or
/// individual datagrams.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Stream,
    Datagram,
}

pub trait Transport {
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

pub struct LocalPipeTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LocalPipeTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W: Write> Transport for LocalPipeTransport<R, W> {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}
