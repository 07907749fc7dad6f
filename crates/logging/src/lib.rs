// crates/logging/src/lib.rs

use std::fs::OpenOptions;
use std::io;
#[cfg(all(unix, feature = "syslog"))]
use std::os::unix::net::UnixDatagram;
#[cfg(all(unix, feature = "syslog"))]
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
#[cfg(all(unix, feature = "syslog"))]
use tracing::{Event, Level, Subscriber};
#[cfg(all(unix, feature = "syslog"))]
use tracing_subscriber::layer::Context;
use tracing_subscriber::{
    EnvFilter, fmt as tracing_fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

mod flags;
mod formatter;
mod json_format;
mod sink;

pub use flags::{LogFormat, SubscriberConfig, SubscriberConfigBuilder};
pub use formatter::PreforkFormatter;
pub use json_format::JsonFormatter;
pub use sink::{FileWriter, LogWriter};

#[cfg(all(unix, feature = "syslog"))]
use crate::formatter::MessageVisitor;

#[cfg(all(unix, feature = "syslog"))]
struct SyslogLayer {
    sock: UnixDatagram,
}

#[cfg(all(unix, feature = "syslog"))]
impl SyslogLayer {
    fn new() -> io::Result<Self> {
        let path = std::env::var_os("PREFORK_SYSLOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/dev/log"));
        let sock = UnixDatagram::unbound()?;
        sock.connect(path)?;
        Ok(Self { sock })
    }
}

#[cfg(all(unix, feature = "syslog"))]
fn syslog_severity(level: Level) -> u8 {
    match level {
        Level::ERROR => 3,
        Level::WARN => 4,
        Level::INFO => 6,
        Level::DEBUG | Level::TRACE => 7,
    }
}

#[cfg(all(unix, feature = "syslog"))]
impl<S> Layer<S> for SyslogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut v = MessageVisitor::default();
        event.record(&mut v);
        let mut msg = v.render();
        if msg.is_empty() {
            msg.push_str(event.metadata().target());
        }
        // LOG_DAEMON facility
        let pri = 24 + syslog_severity(*event.metadata().level());
        let pid = std::process::id();
        let data = format!("<{pri}>prefork[{pid}]: {msg}");
        let _ = self.sock.send(data.as_bytes());
    }
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else if verbose > 2 {
        LevelFilter::TRACE
    } else if verbose > 1 {
        LevelFilter::DEBUG
    } else if verbose > 0 {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

/// Build a [`tracing`] subscriber for the daemon and its workers.
///
/// Console output goes to standard error; `RUST_LOG` directives override
/// the level derived from `verbose`/`quiet`.
pub fn subscriber(cfg: SubscriberConfig) -> io::Result<Box<dyn tracing::Subscriber + Send + Sync>> {
    let SubscriberConfig {
        format,
        verbose,
        quiet,
        log_file,
        syslog,
        colored,
        timestamps,
    } = cfg;

    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose, quiet).into())
        .from_env_lossy();

    let base = tracing_fmt::layer()
        .with_writer(LogWriter)
        .with_target(false)
        .with_level(false);
    let base = if colored { base } else { base.with_ansi(false) };
    let fmt_layer = match (format, timestamps) {
        (LogFormat::Json, _) => base.event_format(JsonFormatter).boxed(),
        (LogFormat::Text, true) => base
            .event_format(PreforkFormatter::new(Some("%t prefork[%p]: %m".to_string())))
            .boxed(),
        (LogFormat::Text, false) => base.event_format(PreforkFormatter::new(None)).boxed(),
    };

    #[cfg(all(unix, feature = "syslog"))]
    let syslog_layer = if syslog {
        SyslogLayer::new().ok()
    } else {
        None
    };
    #[cfg(not(all(unix, feature = "syslog")))]
    let syslog_layer: Option<tracing_subscriber::layer::Identity> = {
        let _ = syslog;
        None
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(syslog_layer);

    let file_layer = if let Some((path, fmt)) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let base = tracing_fmt::layer()
            .with_writer(FileWriter::new(file))
            .with_ansi(false);
        let layer = match fmt.as_deref() {
            Some("json") => base.event_format(JsonFormatter).boxed(),
            Some(spec) => base
                .event_format(PreforkFormatter::new(Some(spec.to_string())))
                .boxed(),
            None => base
                .event_format(PreforkFormatter::new(Some("%t prefork[%p]: %m".to_string())))
                .boxed(),
        };
        Some(layer)
    } else {
        None
    };

    let registry = registry.with(file_layer);
    Ok(Box::new(registry))
}

/// Initialise the global [`tracing`] subscriber.
pub fn init(cfg: SubscriberConfig) -> io::Result<()> {
    subscriber(cfg)?.init();
    Ok(())
}
