// crates/transport/src/error.rs
use std::io;

use thiserror::Error;

use crate::Address;

/// Failure to construct a [`crate::Server`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: Address,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure socket for {address}: {source}")]
    Socket {
        address: Address,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: Address,
        #[source]
        source: io::Error,
    },
    #[error("failed to load configuration: {0}")]
    Config(#[source] io::Error),
}

impl ServerError {
    pub fn is_bind(&self) -> bool {
        matches!(self, ServerError::Bind { .. })
    }
}

/// Why a single request could not be served.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("handler panicked: {0}")]
    Panic(String),
}
