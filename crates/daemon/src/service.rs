// crates/daemon/src/service.rs
use std::io;
use std::path::{self, Path, PathBuf};
use std::sync::Arc;

use logging::{LogFormat, SubscriberConfig};
use tracing::info;

use crate::detach::{DetachOptions, detach_with};
use crate::os::{Posix, ProcessOps};
use crate::pidfile::{PidFileGuard, write_pid_file};
use crate::signals::{SignalBindings, SignalController};
use crate::Lifecycle;

/// Install the process-wide subscriber used by the daemon and its workers.
pub fn init_logging(
    format: LogFormat,
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
    log_format: Option<&str>,
    syslog: bool,
) -> io::Result<()> {
    let cfg = SubscriberConfig::builder()
        .format(format)
        .verbose(verbose)
        .quiet(quiet)
        .log_file(log_file.map(|p| (p.to_path_buf(), log_format.map(|s| s.to_string()))))
        .syslog(syslog)
        .colored(false)
        .timestamps(true)
        .build();
    logging::init(cfg)
}

/// How [`run_daemon`] establishes the process before serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    pub pid_file: Option<PathBuf>,
    pub daemonize: bool,
    /// Standard stream targets used when `daemonize` is set.
    pub detach: DetachOptions,
    pub signals: SignalBindings,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            pid_file: None,
            daemonize: true,
            detach: DetachOptions::default(),
            signals: SignalBindings::default(),
        }
    }
}

pub fn run_daemon(server: Arc<dyn Lifecycle>, opts: &DaemonOptions) -> io::Result<()> {
    run_daemon_with(&Posix, server, opts)
}

/// Detach (or just record the PID), wire signals to `server` and serve until
/// it stops. The PID file is removed exactly once when this returns or
/// unwinds.
pub fn run_daemon_with<P: ProcessOps + ?Sized>(
    ops: &P,
    server: Arc<dyn Lifecycle>,
    opts: &DaemonOptions,
) -> io::Result<()> {
    let pid_file = opts.pid_file.as_deref().map(path::absolute).transpose()?;
    if opts.daemonize {
        let detach = opts.detach.clone().pid_file(pid_file.clone());
        detach_with(ops, &detach)?;
    } else if let Some(path) = &pid_file {
        write_pid_file(path, ops.current_pid())?;
    }
    let _pid_guard = pid_file.map(PidFileGuard::new);

    let _signals = SignalController::install(Arc::clone(&server), opts.signals)?;
    info!(pid = %ops.current_pid(), daemonized = opts.daemonize, "daemon running");
    server.serve_forever()
}
