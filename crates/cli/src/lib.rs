// crates/cli/src/lib.rs
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use logging::LogFormat;

mod control;
mod echo;
mod start;

pub use echo::EchoService;
pub use start::{Settings, resolve_config};

/// Pre-forking socket server daemon.
#[derive(Parser, Debug)]
#[command(name = "preforkd", version)]
#[command(about = "Run and control a pre-forking echo server", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// increase logging verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// also append log records to FILE
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
    /// template for log file lines (%p pid, %t time, %l level, %m message)
    #[arg(long = "log-format-template", value_name = "FMT", global = true)]
    pub log_format_template: Option<String>,
    /// send log records to syslog
    #[arg(long, global = true)]
    pub syslog: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bind the listening socket and serve
    Start(StartOpts),
    /// Stop a running daemon
    Stop(ControlOpts),
    /// Ask a running daemon to reload its configuration
    Reload(ControlOpts),
}

#[derive(Args, Debug, Clone, Default)]
pub struct StartOpts {
    /// configuration file (defaults to $PREFORK_CONFIG_PATH or /etc/preforkd.conf)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// host to listen on; empty means every interface
    #[arg(long, value_name = "HOST")]
    pub address: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// number of pre-forked workers; omit to serve from a single process
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
    /// serve datagrams instead of connections
    #[arg(long)]
    pub udp: bool,
    #[arg(long = "pid-file", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,
    /// stay in the foreground
    #[arg(long = "no-detach")]
    pub no_detach: bool,
    #[arg(long = "ipv6-only")]
    pub ipv6_only: bool,
    #[arg(long = "no-reuse-address")]
    pub no_reuse_address: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ControlOpts {
    #[arg(long = "pid-file", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,
    /// read `pid file` from this configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn init_logging(global: &GlobalOpts, log_file: Option<PathBuf>) -> Result<()> {
    let log_file = global.log_file.clone().or(log_file);
    daemon::init_logging(
        global.log_format,
        global.verbose,
        global.quiet,
        log_file.as_deref(),
        global.log_format_template.as_deref(),
        global.syslog,
    )?;
    Ok(())
}

/// Execute the CLI using `std::env::args()`.
pub fn run() -> Result<()> {
    run_with(std::env::args_os())
}

pub fn run_with<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    match cli.command {
        Commands::Start(opts) => start::run(&cli.global, &opts),
        Commands::Stop(opts) => control::run(&cli.global, "stop", &opts),
        Commands::Reload(opts) => control::run(&cli.global, "reload", &opts),
    }
}
