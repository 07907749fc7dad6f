// src/lib.rs
//! Turn a single-process request handler into a long-lived server or a pool
//! of pre-forked workers sharing one socket, controlled through signals and
//! a PID file.
//!
//! The pieces live in their own crates and are re-exported here:
//! [`transport`] binds and serves, [`daemon`] forks, daemonizes and relays
//! signals, [`logging`] sets up `tracing`.

#[cfg(unix)]
pub use daemon::{
    self, DaemonOptions, DetachOptions, Lifecycle, Outcome, PoolState, ProcessController, Role,
    SignalBindings, SignalController, WorkerPool, detach, run_daemon,
};
pub use logging;
pub use transport::{
    self, Address, RequestError, Server, ServerConfig, ServerError, Service, Transport,
    TransportKind,
};
