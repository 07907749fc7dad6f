// crates/cli/src/start.rs
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use daemon::config::{DaemonConfig, load_config};
use daemon::{DaemonOptions, DetachOptions, Lifecycle, SignalBindings, WorkerPool, run_daemon};
use tracing::info;
use transport::{Address, Server, ServerConfig, TransportKind};

use crate::echo::EchoService;
use crate::{GlobalOpts, StartOpts, init_logging};

pub const DEFAULT_PORT: u16 = 7000;

/// Load the configuration named on the command line, or the default one if
/// it exists. Returns the path actually read so the service can re-read it.
pub fn resolve_config(path: Option<&Path>) -> io::Result<(DaemonConfig, Option<PathBuf>)> {
    if let Some(p) = path {
        return Ok((load_config(Some(p))?, Some(p.to_path_buf())));
    }
    let default = std::env::var_os("PREFORK_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/preforkd.conf"));
    match load_config(None) {
        Ok(cfg) => Ok((cfg, Some(default))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((DaemonConfig::default(), None)),
        Err(e) => Err(e),
    }
}

/// Effective start-up parameters: command line flags over file values over
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub address: Address,
    pub kind: TransportKind,
    pub workers: Option<usize>,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub daemonize: bool,
    pub reuse_address: bool,
    pub ipv6_only: bool,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl Settings {
    pub fn merge(cfg: &DaemonConfig, opts: &StartOpts) -> Self {
        let host = opts
            .address
            .clone()
            .or_else(|| cfg.address.clone())
            .unwrap_or_default();
        let port = opts.port.or(cfg.port).unwrap_or(DEFAULT_PORT);
        let kind = if opts.udp {
            TransportKind::Datagram
        } else {
            cfg.protocol.unwrap_or(TransportKind::Stream)
        };
        Self {
            address: Address::new(host, port),
            kind,
            workers: opts.workers.or(cfg.workers),
            pid_file: opts.pid_file.clone().or_else(|| cfg.pid_file.clone()),
            log_file: cfg.log_file.clone(),
            daemonize: !opts.no_detach && cfg.daemonize.unwrap_or(true),
            reuse_address: !opts.no_reuse_address && cfg.reuse_address.unwrap_or(true),
            ipv6_only: opts.ipv6_only || cfg.ipv6_only.unwrap_or(false),
            stdout: cfg.stdout.clone(),
            stderr: cfg.stderr.clone(),
        }
    }

    fn detach_options(&self) -> DetachOptions {
        let mut detach = DetachOptions::default();
        if let Some(stdout) = &self.stdout {
            detach = detach.stdout(stdout);
        }
        detach.stderr(self.stderr.clone())
    }
}

pub(crate) fn run(global: &GlobalOpts, opts: &StartOpts) -> Result<()> {
    let (cfg, config_path) = resolve_config(opts.config.as_deref())
        .context("failed to load configuration")?;
    let settings = Settings::merge(&cfg, opts);
    init_logging(global, settings.log_file.clone())?;

    let server_cfg = ServerConfig::builder()
        .allow_reuse_address(settings.reuse_address)
        .ipv6_only(settings.ipv6_only)
        .build()?;
    let service = Arc::new(EchoService::new(config_path));
    let server = Arc::new(Server::bind(
        settings.address.clone(),
        settings.kind,
        server_cfg,
        service,
    )?);
    let port = server.local_addr()?.port();
    info!(address = %settings.address, port, kind = ?settings.kind, "bound");
    if !settings.daemonize {
        let mut out = io::stdout();
        writeln!(out, "{port}")?;
        out.flush()?;
    }

    let target: Arc<dyn Lifecycle> = match settings.workers {
        Some(n) => Arc::new(WorkerPool::new(server, n)),
        None => server,
    };
    let daemon_opts = DaemonOptions {
        pid_file: settings.pid_file.clone(),
        daemonize: settings.daemonize,
        detach: settings.detach_options(),
        signals: SignalBindings::default(),
    };
    run_daemon(target, &daemon_opts)?;
    info!("stopped");
    Ok(())
}
