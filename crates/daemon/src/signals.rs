// crates/daemon/src/signals.rs
#![allow(unsafe_code)]

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use nix::sys::signal::{SigSet, SigmaskHow, Signal};
use signal_hook::SigId;
use signal_hook::low_level;
use tracing::{debug, warn};

use crate::Lifecycle;

/// Which signal triggers which control event. `None` disables the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalBindings {
    pub reload: Option<Signal>,
    pub shutdown: Option<Signal>,
}

impl Default for SignalBindings {
    fn default() -> Self {
        Self {
            reload: Some(Signal::SIGUSR1),
            shutdown: Some(Signal::SIGTERM),
        }
    }
}

impl SignalBindings {
    pub fn disabled() -> Self {
        Self {
            reload: None,
            shutdown: None,
        }
    }

    pub fn with_reload(mut self, signal: Option<Signal>) -> Self {
        self.reload = signal;
        self
    }

    pub fn with_shutdown(mut self, signal: Option<Signal>) -> Self {
        self.shutdown = signal;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.reload.is_none() && self.shutdown.is_none()
    }

    pub fn event_for(&self, signo: i32) -> Option<ControlEvent> {
        if self.shutdown.map(|s| s as i32) == Some(signo) {
            Some(ControlEvent::Shutdown)
        } else if self.reload.map(|s| s as i32) == Some(signo) {
            Some(ControlEvent::Reload)
        } else {
            None
        }
    }

    pub(crate) fn signals(&self) -> Vec<Signal> {
        self.shutdown.into_iter().chain(self.reload).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Reload,
    Shutdown,
}

/// Maps delivered signals to calls on a [`Lifecycle`].
///
/// Every event runs on a freshly spawned thread so the listener that
/// observed the signal is never blocked by a slow reload or shutdown.
#[derive(Clone)]
pub struct SignalTable {
    target: Arc<dyn Lifecycle>,
    bindings: SignalBindings,
}

impl SignalTable {
    pub fn new(target: Arc<dyn Lifecycle>, bindings: SignalBindings) -> Self {
        Self { target, bindings }
    }

    pub fn bindings(&self) -> SignalBindings {
        self.bindings
    }

    /// Handle one delivered signal. Returns the handle of the thread running
    /// the event, or `None` when the signal is not bound.
    pub fn dispatch(&self, signo: i32) -> Option<JoinHandle<()>> {
        let event = self.bindings.event_for(signo)?;
        let target = Arc::clone(&self.target);
        let name = match event {
            ControlEvent::Reload => "prefork-reload",
            ControlEvent::Shutdown => "prefork-shutdown",
        };
        debug!(signal = signo, ?event, "signal received");
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match event {
                ControlEvent::Shutdown => target.shutdown(),
                ControlEvent::Reload => {
                    if let Err(err) = target.load_config() {
                        warn!(%err, "reload failed");
                    }
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, ?event, "failed to spawn control thread");
                None
            }
        }
    }
}

const SLOTS: usize = 65;

/// Per signal number: the pid whose controllers handle it in the high half,
/// how many of them are installed in the low half.
static CLAIMS: [AtomicU64; SLOTS] = [const { AtomicU64::new(0) }; SLOTS];
static FALLBACKS: [AtomicBool; SLOTS] = [const { AtomicBool::new(false) }; SLOTS];

fn pack(pid: libc::pid_t, count: u32) -> u64 {
    (u64::from(pid as u32) << 32) | u64::from(count)
}

fn claimed_by(signo: i32, pid: libc::pid_t) -> bool {
    match CLAIMS.get(signo as usize) {
        Some(slot) => {
            let v = slot.load(Ordering::SeqCst);
            (v >> 32) as u32 == pid as u32 && v as u32 > 0
        }
        None => false,
    }
}

fn claim(signo: i32, pid: libc::pid_t) {
    if let Some(slot) = CLAIMS.get(signo as usize) {
        let _ = slot.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            let count = if (v >> 32) as u32 == pid as u32 { v as u32 } else { 0 };
            Some(pack(pid, count + 1))
        });
    }
}

fn release(signo: i32, pid: libc::pid_t) {
    if let Some(slot) = CLAIMS.get(signo as usize) {
        let _ = slot.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            let count = v as u32;
            ((v >> 32) as u32 == pid as u32 && count > 0).then(|| pack(pid, count - 1))
        });
    }
}

/// Register, once per process tree, an action that applies the default
/// disposition of `signo` whenever no controller of the receiving process
/// handles it. Covers forked children that only inherited their parent's
/// handlers and processes whose controllers were uninstalled.
fn ensure_default_fallback(signo: i32) -> io::Result<()> {
    let Some(flag) = FALLBACKS.get(signo as usize) else {
        return Ok(());
    };
    if flag.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    // SAFETY: the action only calls getpid, reads an atomic and emulates the
    // default handler, all async-signal-safe.
    let registered = unsafe {
        low_level::register(signo, move || {
            if !claimed_by(signo, libc::getpid()) {
                let _ = low_level::emulate_default_handler(signo);
            }
        })
    };
    if let Err(err) = registered {
        flag.store(false, Ordering::SeqCst);
        return Err(err);
    }
    Ok(())
}

/// Signals held pending on the calling thread until dropped.
///
/// Blocked across `fork` so that a signal sent to a new worker before it
/// installed its own controller is delivered once it has.
pub(crate) struct BlockedSignals {
    previous: Option<SigSet>,
}

impl BlockedSignals {
    pub(crate) fn block(signals: &[Signal]) -> Self {
        let mut set = SigSet::empty();
        for &signal in signals {
            set.add(signal);
        }
        match set.thread_swap_mask(SigmaskHow::SIG_BLOCK) {
            Ok(previous) => Self {
                previous: Some(previous),
            },
            Err(err) => {
                warn!(%err, "failed to block signals");
                Self { previous: None }
            }
        }
    }
}

impl Drop for BlockedSignals {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(err) = previous.thread_set_mask() {
                warn!(%err, "failed to restore signal mask");
            }
        }
    }
}

/// Installed signal handlers for one [`Lifecycle`].
///
/// The OS-level handler only writes the signal number into a socket pair;
/// a listener thread reads it and hands it to [`SignalTable::dispatch`].
/// Handlers ignore deliveries in processes other than the installing one.
/// A process with no installed controller for a signal gets its default
/// action, including after [`SignalController::uninstall`].
pub struct SignalController {
    owner: libc::pid_t,
    ids: Vec<SigId>,
    claimed: Vec<i32>,
    waker: Option<UnixStream>,
    listener: Option<JoinHandle<()>>,
}

impl SignalController {
    pub fn install(target: Arc<dyn Lifecycle>, bindings: SignalBindings) -> io::Result<Self> {
        // SAFETY: getpid has no preconditions.
        let owner = unsafe { libc::getpid() };
        let mut controller = SignalController {
            owner,
            ids: Vec::new(),
            claimed: Vec::new(),
            waker: None,
            listener: None,
        };
        if bindings.is_disabled() {
            return Ok(controller);
        }

        let (mut reader, writer) = UnixStream::pair()?;
        writer.set_nonblocking(true)?;
        let fd = writer.as_raw_fd();
        for signal in bindings.signals() {
            let signo = signal as i32;
            let byte = signo as u8;
            if let Err(err) = ensure_default_fallback(signo) {
                controller.uninstall();
                return Err(err);
            }
            // SAFETY: the action only calls getpid and write, both
            // async-signal-safe, and never allocates.
            let registered = unsafe {
                low_level::register(signo, move || {
                    if libc::getpid() == owner {
                        let _ = libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
                    }
                })
            };
            match registered {
                Ok(id) => {
                    controller.ids.push(id);
                    claim(signo, owner);
                    controller.claimed.push(signo);
                }
                Err(err) => {
                    controller.uninstall();
                    return Err(err);
                }
            }
        }
        controller.waker = Some(writer);

        let table = SignalTable::new(target, bindings);
        let listener = thread::Builder::new()
            .name("signal-listener".to_string())
            .spawn(move || {
                let mut buf = [0u8; 16];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            for &signo in &buf[..n] {
                                if signo == 0 {
                                    return;
                                }
                                table.dispatch(i32::from(signo));
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(err) => {
                            warn!(%err, "signal listener stopped");
                            break;
                        }
                    }
                }
            });
        match listener {
            Ok(handle) => controller.listener = Some(handle),
            Err(err) => {
                controller.uninstall();
                return Err(err);
            }
        }
        debug!(?bindings, "signal handlers installed");
        Ok(controller)
    }

    pub fn is_active(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Unregister the handlers and stop the listener thread. Signals no
    /// other controller handles fall back to their default action.
    pub fn uninstall(&mut self) {
        for id in self.ids.drain(..) {
            low_level::unregister(id);
        }
        for signo in self.claimed.drain(..) {
            release(signo, self.owner);
        }
        if let Some(mut waker) = self.waker.take() {
            let _ = waker.set_nonblocking(false);
            let _ = waker.write_all(&[0]);
        }
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SignalController {
    fn drop(&mut self) {
        self.uninstall();
    }
}
