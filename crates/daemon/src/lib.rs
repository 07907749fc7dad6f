// crates/daemon/src/lib.rs
//! Process model for `transport` servers: pre-forked worker pools,
//! signal-driven shutdown and reload, daemonization and PID-file control.
#![cfg(unix)]

pub mod config;
mod control;
mod detach;
mod lifecycle;
pub mod os;
mod pidfile;
mod pool;
mod service;
mod signals;

pub use control::{Action, ControlError, Outcome, ProcessController};
pub use detach::{DetachOptions, detach, detach_with};
pub use lifecycle::Lifecycle;
pub use os::{Fork, Posix, ProcessOps};
pub use pidfile::{PidFileGuard, parse_pid, read_pid_file, remove_pid_file, write_pid_file};
pub use pool::{PoolState, Role, WorkerPool};
pub use service::{DaemonOptions, init_logging, run_daemon, run_daemon_with};
pub use signals::{ControlEvent, SignalBindings, SignalController, SignalTable};

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;
