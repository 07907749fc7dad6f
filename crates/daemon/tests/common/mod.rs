// crates/daemon/tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use daemon::{Fork, Lifecycle, Pid, ProcessOps, Signal};
use nix::sys::wait::WaitStatus;

/// Payload of the panic a fake `exit` raises in place of terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeExit(pub i32);

#[derive(Debug, Clone, Copy)]
pub enum FakeFork {
    Parent,
    Child,
    Fail(i32),
}

pub struct FakeOps {
    pub pid: i32,
    pub next_child: AtomicI32,
    pub plan: Mutex<VecDeque<FakeFork>>,
    pub forks: AtomicUsize,
    pub kills: Mutex<Vec<(Pid, Signal)>>,
    pub kill_error: Option<i32>,
    pub waits: Mutex<Vec<Pid>>,
    pub sessions: AtomicUsize,
    pub redirects: AtomicUsize,
    pub hold_waits: bool,
    pub released: Mutex<bool>,
    pub cv: Condvar,
}

impl Default for FakeOps {
    fn default() -> Self {
        Self {
            pid: 4242,
            next_child: AtomicI32::new(100),
            plan: Mutex::new(VecDeque::new()),
            forks: AtomicUsize::new(0),
            kills: Mutex::new(Vec::new()),
            kill_error: None,
            waits: Mutex::new(Vec::new()),
            sessions: AtomicUsize::new(0),
            redirects: AtomicUsize::new(0),
            hold_waits: false,
            released: Mutex::new(false),
            cv: Condvar::new(),
        }
    }
}

impl FakeOps {
    /// Script the results of upcoming forks; unscripted forks succeed as the
    /// parent.
    pub fn with_plan(plan: &[FakeFork]) -> Self {
        Self {
            plan: Mutex::new(plan.iter().copied().collect()),
            ..Self::default()
        }
    }

    /// Make every `wait` block until [`FakeOps::release`].
    pub fn holding_waits() -> Self {
        Self {
            hold_waits: true,
            ..Self::default()
        }
    }

    pub fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn fork_count(&self) -> usize {
        self.forks.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> Vec<(Pid, Signal)> {
        self.kills.lock().unwrap().clone()
    }

    pub fn waits(&self) -> Vec<Pid> {
        self.waits.lock().unwrap().clone()
    }
}

impl ProcessOps for FakeOps {
    fn fork(&self) -> io::Result<Fork> {
        self.forks.fetch_add(1, Ordering::SeqCst);
        match self.plan.lock().unwrap().pop_front().unwrap_or(FakeFork::Parent) {
            FakeFork::Parent => {
                let pid = self.next_child.fetch_add(1, Ordering::SeqCst);
                Ok(Fork::Parent(Pid::from_raw(pid)))
            }
            FakeFork::Child => Ok(Fork::Child),
            FakeFork::Fail(errno) => Err(io::Error::from_raw_os_error(errno)),
        }
    }

    fn kill(&self, pid: Pid, signal: Signal) -> io::Result<()> {
        self.kills.lock().unwrap().push((pid, signal));
        match self.kill_error {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }

    fn wait(&self, pid: Pid) -> io::Result<WaitStatus> {
        if self.hold_waits {
            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.cv.wait(released).unwrap();
            }
        }
        self.waits.lock().unwrap().push(pid);
        Ok(WaitStatus::Exited(pid, 0))
    }

    fn current_pid(&self) -> Pid {
        Pid::from_raw(self.pid)
    }

    fn new_session(&self) -> io::Result<()> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn redirect_stdio(&self, _stdin: &File, _stdout: &File, _stderr: &File) -> io::Result<()> {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self, code: i32) -> ! {
        panic::panic_any(FakeExit(code))
    }
}

/// Run `f`, expecting it to end through a fake `exit`.
pub fn expect_exit<R>(f: impl FnOnce() -> R) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected the process to exit"),
        Err(payload) => match payload.downcast_ref::<FakeExit>() {
            Some(FakeExit(code)) => *code,
            None => panic::resume_unwind(payload),
        },
    }
}

#[derive(Default)]
pub struct FakeServer {
    pub serves: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub reloads: AtomicUsize,
    pub fail_serve: bool,
    pub panic_serve: bool,
    /// Snapshot of this file's contents taken while serving.
    pub watch: Option<PathBuf>,
    pub seen: Mutex<Option<String>>,
}

impl FakeServer {
    pub fn serves(&self) -> usize {
        self.serves.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Lifecycle for FakeServer {
    fn serve_forever(&self) -> io::Result<()> {
        self.serves.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = &self.watch {
            *self.seen.lock().unwrap() = std::fs::read_to_string(path).ok();
        }
        if self.panic_serve {
            panic!("serve blew up");
        }
        if self.fail_serve {
            return Err(io::Error::other("serve failed"));
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn load_config(&self) -> io::Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
