// crates/daemon/src/pool.rs
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracing::{debug, error, info, info_span, warn};

use crate::os::{self, Fork, Posix, ProcessOps};
use crate::signals::{BlockedSignals, SignalBindings, SignalController};
use crate::Lifecycle;

/// Observable progress of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Forking,
    Running,
    Draining,
    Terminated,
}

/// What this process is within the pool's process tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The forking process, holding the PIDs of its live workers in fork
    /// order.
    Master(Vec<Pid>),
    Worker,
}

struct Inner {
    state: PoolState,
    role: Option<Role>,
    reaped: Vec<WaitStatus>,
}

/// Runs a [`Lifecycle`] in `workers` forked processes sharing its socket.
pub struct WorkerPool<L, P = Posix> {
    server: Arc<L>,
    workers: usize,
    signals: SignalBindings,
    ops: P,
    inner: Mutex<Inner>,
}

impl<L: Lifecycle + 'static> WorkerPool<L, Posix> {
    pub fn new(server: Arc<L>, workers: usize) -> Self {
        Self::with_ops(server, workers, Posix)
    }
}

impl<L: Lifecycle + 'static, P: ProcessOps> WorkerPool<L, P> {
    pub fn with_ops(server: Arc<L>, workers: usize, ops: P) -> Self {
        Self {
            server,
            workers,
            signals: SignalBindings::default(),
            ops,
            inner: Mutex::new(Inner {
                state: PoolState::Created,
                role: None,
                reaped: Vec::new(),
            }),
        }
    }

    /// Signals each worker installs for itself, and that the master uses
    /// when relaying shutdown and reload.
    pub fn with_signals(mut self, bindings: SignalBindings) -> Self {
        self.signals = bindings;
        self
    }

    pub fn server(&self) -> &Arc<L> {
        &self.server
    }

    pub fn ops(&self) -> &P {
        &self.ops
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn state(&self) -> PoolState {
        self.lock().state
    }

    pub fn role(&self) -> Option<Role> {
        self.lock().role.clone()
    }

    /// PIDs of workers not yet reaped. Empty outside the master.
    pub fn worker_pids(&self) -> Vec<Pid> {
        match &self.lock().role {
            Some(Role::Master(pids)) => pids.clone(),
            _ => Vec::new(),
        }
    }

    /// How each reaped worker ended, in reaping order.
    pub fn exit_statuses(&self) -> Vec<WaitStatus> {
        self.lock().reaped.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn shutdown_signal(&self) -> Signal {
        self.signals.shutdown.unwrap_or(Signal::SIGTERM)
    }

    fn relayed_signals(&self) -> Vec<Signal> {
        let mut signals = self.signals.signals();
        let shutdown = self.shutdown_signal();
        if !signals.contains(&shutdown) {
            signals.push(shutdown);
        }
        signals
    }

    fn signal_workers(&self, pids: &[Pid], signal: Signal) {
        for &pid in pids {
            match self.ops.kill(pid, signal) {
                Ok(()) => debug!(%pid, ?signal, "signalled worker"),
                Err(err) if os::is_no_such_process(&err) => {
                    debug!(%pid, ?signal, "worker already gone")
                }
                Err(err) => warn!(%pid, ?signal, %err, "failed to signal worker"),
            }
        }
    }

    fn reap_all(&self) -> io::Result<()> {
        loop {
            let next = match &self.lock().role {
                Some(Role::Master(pids)) => pids.first().copied(),
                _ => None,
            };
            let Some(pid) = next else {
                return Ok(());
            };
            match os::reap(&self.ops, pid)? {
                Some(status) => {
                    debug!(%pid, ?status, "reaped worker");
                    self.lock().reaped.push(status);
                }
                None => debug!(%pid, "worker already reaped"),
            }
            if let Some(Role::Master(pids)) = &mut self.lock().role {
                pids.retain(|p| *p != pid);
            }
        }
    }

    fn run_worker(&self, blocked: BlockedSignals) -> ! {
        let _span = info_span!("worker").entered();
        let target: Arc<dyn Lifecycle> = self.server.clone();
        let controller = match SignalController::install(target, self.signals) {
            Ok(c) => Some(c),
            Err(err) => {
                error!(%err, "worker failed to install signal handlers");
                None
            }
        };
        // Anything the master sent since the fork is delivered here.
        drop(blocked);
        let code = match panic::catch_unwind(AssertUnwindSafe(|| self.server.serve_forever())) {
            Ok(Ok(())) => 0,
            Ok(Err(err)) => {
                error!(%err, "worker loop failed");
                1
            }
            Err(_) => {
                error!("worker loop panicked");
                1
            }
        };
        drop(controller);
        debug!(code, "worker exiting");
        self.ops.exit(code)
    }

    fn abort_fork_loop(&self, err: io::Error) -> io::Result<()> {
        let pids = self.worker_pids();
        error!(%err, forked = pids.len(), "fork failed, stopping workers");
        self.lock().state = PoolState::Draining;
        self.signal_workers(&pids, self.shutdown_signal());
        let reaped = self.reap_all();
        self.lock().state = PoolState::Terminated;
        reaped?;
        Err(err)
    }
}

impl<L: Lifecycle + 'static, P: ProcessOps> Lifecycle for WorkerPool<L, P> {
    /// Fork the workers, then block until every one of them is reaped.
    ///
    /// In a worker this never returns: the process exits when its accept
    /// loop ends.
    fn serve_forever(&self) -> io::Result<()> {
        {
            let mut inner = self.lock();
            if inner.state != PoolState::Created {
                return Err(io::Error::other("worker pool already started"));
            }
            inner.state = PoolState::Forking;
            inner.role = Some(Role::Master(Vec::with_capacity(self.workers)));
        }

        for n in 0..self.workers {
            // Held across fork so the child never inherits it locked.
            let mut inner = self.lock();
            if inner.state == PoolState::Draining {
                debug!(forked = n, "shutdown during fork loop");
                break;
            }
            let blocked = BlockedSignals::block(&self.relayed_signals());
            match self.ops.fork() {
                Ok(Fork::Child) => {
                    inner.role = Some(Role::Worker);
                    inner.state = PoolState::Running;
                    drop(inner);
                    self.run_worker(blocked);
                }
                Ok(Fork::Parent(pid)) => {
                    drop(blocked);
                    if let Some(Role::Master(pids)) = &mut inner.role {
                        pids.push(pid);
                    }
                    info!(worker = n, %pid, "forked worker");
                }
                Err(err) => {
                    drop(blocked);
                    drop(inner);
                    return self.abort_fork_loop(err);
                }
            }
        }

        {
            let mut inner = self.lock();
            if inner.state == PoolState::Forking {
                inner.state = PoolState::Running;
            }
        }
        let reaped = self.reap_all();
        self.lock().state = PoolState::Terminated;
        reaped?;
        info!("all workers exited");
        Ok(())
    }

    fn shutdown(&self) {
        let pids = {
            let mut inner = self.lock();
            let pids = match &inner.role {
                Some(Role::Master(pids)) => Some(pids.clone()),
                _ => None,
            };
            if pids.is_some() && inner.state != PoolState::Terminated {
                inner.state = PoolState::Draining;
            }
            pids
        };
        match pids {
            Some(pids) => {
                info!(workers = pids.len(), "stopping workers");
                self.signal_workers(&pids, self.shutdown_signal());
            }
            None => self.server.shutdown(),
        }
    }

    fn load_config(&self) -> io::Result<()> {
        let pids = match &self.lock().role {
            Some(Role::Master(pids)) => Some(pids.clone()),
            _ => None,
        };
        match (pids, self.signals.reload) {
            (None, _) => self.server.load_config(),
            (Some(_), None) => {
                debug!("workers have reload disabled, not relaying");
                Ok(())
            }
            (Some(pids), Some(signal)) => {
                info!(workers = pids.len(), "reloading workers");
                self.signal_workers(&pids, signal);
                Ok(())
            }
        }
    }
}
