// crates/cli/src/control.rs
use std::path::PathBuf;

use anyhow::{Result, bail};
use daemon::{Outcome, Posix, ProcessController};

use crate::start::resolve_config;
use crate::{ControlOpts, GlobalOpts, init_logging};

fn pid_file(opts: &ControlOpts) -> Result<PathBuf> {
    if let Some(path) = &opts.pid_file {
        return Ok(path.clone());
    }
    let (cfg, _) = resolve_config(opts.config.as_deref())?;
    match cfg.pid_file {
        Some(path) => Ok(path),
        None => bail!("no pid file given; use --pid-file or set `pid file` in the configuration"),
    }
}

pub(crate) fn run(global: &GlobalOpts, action: &str, opts: &ControlOpts) -> Result<()> {
    init_logging(global, None)?;
    let path = pid_file(opts)?;
    match ProcessController::new(Posix).send_action(action, &path)? {
        Outcome::Signalled(pid) => println!("sent {action} to {pid}"),
        Outcome::NotRunning => eprintln!("No pid file available: {}", path.display()),
        Outcome::Ignored => {}
    }
    Ok(())
}
