// crates/daemon/src/os.rs
#![allow(unsafe_code)]

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsRawFd;

use nix::sys::signal::{Signal, kill};
use nix::sys::stat::{Mode, umask};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, chdir, fork, getpid, setsid};

/// Which side of a successful `fork(2)` the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    Parent(Pid),
    Child,
}

/// Process-level operations used by the worker pool, the daemonizer and the
/// process controller.
///
/// [`Posix`] performs the real system calls; tests substitute a recording
/// fake so fork counts and signal targets can be checked without touching
/// the test process.
pub trait ProcessOps: Send + Sync {
    fn fork(&self) -> io::Result<Fork>;

    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()>;

    /// Wait for `pid` once. `EINTR` and `ECHILD` are reported to the caller
    /// unchanged.
    fn wait(&self, pid: Pid) -> io::Result<WaitStatus>;

    fn current_pid(&self) -> Pid;

    /// Leave the controlling terminal's session: `chdir("/")`, `umask(0)`,
    /// `setsid()`.
    fn new_session(&self) -> io::Result<()>;

    /// Replace descriptors 0, 1 and 2 with the given files.
    fn redirect_stdio(&self, stdin: &File, stdout: &File, stderr: &File) -> io::Result<()>;

    /// Terminate the calling process without unwinding.
    fn exit(&self, code: i32) -> !;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Posix;

impl ProcessOps for Posix {
    fn fork(&self) -> io::Result<Fork> {
        // SAFETY: the child only continues into code that re-initialises its
        // own state (signal listener, accept loop) or terminates through
        // `exit`; no lock held by another thread is touched before that.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => Ok(Fork::Parent(child)),
            Ok(ForkResult::Child) => Ok(Fork::Child),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()> {
        kill(pid, signal).map_err(io::Error::from)
    }

    fn wait(&self, pid: Pid) -> io::Result<WaitStatus> {
        waitpid(pid, None).map_err(io::Error::from)
    }

    fn current_pid(&self) -> Pid {
        getpid()
    }

    fn new_session(&self) -> io::Result<()> {
        chdir("/").map_err(io::Error::from)?;
        umask(Mode::empty());
        setsid().map_err(io::Error::from)?;
        Ok(())
    }

    fn redirect_stdio(&self, stdin: &File, stdout: &File, stderr: &File) -> io::Result<()> {
        for (file, target) in [(stdin, 0), (stdout, 1), (stderr, 2)] {
            // SAFETY: both descriptors are open for the duration of the call;
            // `dup2` atomically replaces `target`.
            if unsafe { libc::dup2(file.as_raw_fd(), target) } < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn exit(&self, code: i32) -> ! {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        // SAFETY: `_exit` never returns and skips atexit handlers inherited
        // from the parent process.
        unsafe { libc::_exit(code) }
    }
}

/// Whether an error from [`ProcessOps::wait`] means the child is already
/// gone.
pub(crate) fn is_no_child(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ECHILD)
}

/// Whether an error from [`ProcessOps::kill`] means the target is gone.
pub(crate) fn is_no_such_process(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ESRCH)
}

/// Reap `pid`, retrying on `EINTR` and treating `ECHILD` as already reaped.
pub(crate) fn reap<P: ProcessOps + ?Sized>(ops: &P, pid: Pid) -> io::Result<Option<WaitStatus>> {
    loop {
        match ops.wait(pid) {
            Ok(status) => return Ok(Some(status)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_no_child(&e) => return Ok(None),
            Err(e) => return Err(e),
        }
    }
}
