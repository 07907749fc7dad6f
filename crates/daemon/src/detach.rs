// crates/daemon/src/detach.rs
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{self, Path, PathBuf};

use tracing::{debug, error};

use crate::os::{Fork, Posix, ProcessOps};
use crate::pidfile::write_pid_file;

/// Where a detached daemon's standard streams go and where its PID is
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachOptions {
    pub stdin: PathBuf,
    pub stdout: PathBuf,
    /// Defaults to the `stdout` path.
    pub stderr: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
}

impl Default for DetachOptions {
    fn default() -> Self {
        Self {
            stdin: PathBuf::from("/dev/null"),
            stdout: PathBuf::from("/dev/null"),
            stderr: None,
            pid_file: None,
        }
    }
}

impl DetachOptions {
    pub fn pid_file(mut self, path: Option<PathBuf>) -> Self {
        self.pid_file = path;
        self
    }

    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = path.into();
        self
    }

    pub fn stderr(mut self, path: Option<PathBuf>) -> Self {
        self.stderr = path;
        self
    }

    /// Anchor relative paths at the current directory, which is about to
    /// change to `/`.
    fn absolute(&self) -> io::Result<Self> {
        Ok(Self {
            stdin: path::absolute(&self.stdin)?,
            stdout: path::absolute(&self.stdout)?,
            stderr: self.stderr.as_deref().map(path::absolute).transpose()?,
            pid_file: self.pid_file.as_deref().map(path::absolute).transpose()?,
        })
    }
}

/// Turn the calling process into a daemon with the real system calls.
///
/// Only the final grandchild returns; both intermediate parents exit with
/// status 0.
pub fn detach(opts: &DetachOptions) -> io::Result<()> {
    detach_with(&Posix, opts)
}

pub fn detach_with<P: ProcessOps + ?Sized>(ops: &P, opts: &DetachOptions) -> io::Result<()> {
    let opts = opts.absolute()?;

    fork_or_exit(ops, 1);
    ops.new_session()?;
    fork_or_exit(ops, 2);

    let stdin = File::open(&opts.stdin)?;
    let stdout = open_append(&opts.stdout)?;
    let stderr = open_append(opts.stderr.as_deref().unwrap_or(&opts.stdout))?;
    let pid = ops.current_pid();
    if let Some(path) = &opts.pid_file {
        write_pid_file(path, pid)?;
    }
    debug!(%pid, "detached");
    ops.redirect_stdio(&stdin, &stdout, &stderr)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn fork_or_exit<P: ProcessOps + ?Sized>(ops: &P, n: u32) {
    match ops.fork() {
        Ok(Fork::Child) => {}
        Ok(Fork::Parent(child)) => {
            debug!(fork = n, %child, "detach parent exiting");
            ops.exit(0)
        }
        Err(err) => {
            error!(fork = n, %err, "fork failed");
            eprintln!("fork #{n} failed: {err}");
            ops.exit(1)
        }
    }
}
