// crates/daemon/src/control.rs
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{info, warn};

use crate::os::{Posix, ProcessOps};
use crate::pidfile::read_pid_file;
use crate::signals::SignalBindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reload,
    Stop,
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reload" => Ok(Action::Reload),
            "stop" => Ok(Action::Stop),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Reload => f.write_str("reload"),
            Action::Stop => f.write_str("stop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Signalled(Pid),
    NotRunning,
    Ignored,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path} does not contain a valid pid: {source}")]
    InvalidPid {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send {signal:?} to {pid}: {source}")]
    Signal {
        pid: Pid,
        signal: Signal,
        #[source]
        source: io::Error,
    },
}

/// Sends control signals to a running daemon named by its PID file.
pub struct ProcessController<P = Posix> {
    ops: P,
    bindings: SignalBindings,
}

impl Default for ProcessController<Posix> {
    fn default() -> Self {
        Self::new(Posix)
    }
}

impl<P: ProcessOps> ProcessController<P> {
    pub fn new(ops: P) -> Self {
        Self {
            ops,
            bindings: SignalBindings::default(),
        }
    }

    /// Use the daemon's bindings to pick the reload signal.
    pub fn with_bindings(mut self, bindings: SignalBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn ops(&self) -> &P {
        &self.ops
    }

    pub fn send_action(&self, action: &str, pid_file: &Path) -> Result<Outcome, ControlError> {
        let Ok(action) = action.parse::<Action>() else {
            return Ok(Outcome::Ignored);
        };
        let signal = match action {
            Action::Stop => Signal::SIGTERM,
            Action::Reload => match self.bindings.reload {
                Some(signal) => signal,
                None => return Ok(Outcome::Ignored),
            },
        };
        let path = pid_file.display().to_string();
        if !pid_file.exists() {
            warn!(%path, "no pid file available");
            return Ok(Outcome::NotRunning);
        }
        let pid = read_pid_file(pid_file).map_err(|source| {
            if source.kind() == io::ErrorKind::InvalidData {
                ControlError::InvalidPid {
                    path: path.clone(),
                    source,
                }
            } else {
                ControlError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        self.ops
            .kill(pid, signal)
            .map_err(|source| ControlError::Signal {
                pid,
                signal,
                source,
            })?;
        info!(%pid, %action, ?signal, "signal sent");
        Ok(Outcome::Signalled(pid))
    }
}
