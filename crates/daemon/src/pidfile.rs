// crates/daemon/src/pidfile.rs
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use tracing::{debug, warn};

/// Write `pid` followed by a newline, replacing any previous content.
pub fn write_pid_file(path: &Path, pid: Pid) -> io::Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(f, "{pid}")?;
    f.flush()
}

pub fn read_pid_file(path: &Path) -> io::Result<Pid> {
    let contents = fs::read_to_string(path)?;
    parse_pid(&contents)
}

pub fn parse_pid(contents: &str) -> io::Result<Pid> {
    let raw = contents.trim();
    let pid: i32 = raw.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid pid {raw:?}: {e}"),
        )
    })?;
    if pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid pid {pid}"),
        ));
    }
    Ok(Pid::from_raw(pid))
}

/// Remove `path`, treating an already missing file as success.
pub fn remove_pid_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Removes the PID file when dropped, however the owning scope ends.
pub struct PidFileGuard {
    path: Option<PathBuf>,
}

impl PidFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Keep the file in place; the guard no longer removes it.
    pub fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match remove_pid_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed pid file"),
                Err(err) => warn!(path = %path.display(), %err, "failed to remove pid file"),
            }
        }
    }
}
