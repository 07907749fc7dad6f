use logging::{LogFormat, SubscriberConfig, subscriber};
use tracing::Level;
use tracing::subscriber::with_default;

fn build(verbose: u8, quiet: bool) -> Box<dyn tracing::Subscriber + Send + Sync> {
    let cfg = SubscriberConfig::builder()
        .format(LogFormat::Text)
        .verbose(verbose)
        .quiet(quiet)
        .colored(false)
        .build();
    subscriber(cfg).unwrap()
}

#[test]
fn info_not_emitted_by_default() {
    with_default(build(0, false), || {
        assert!(tracing::enabled!(Level::WARN));
        assert!(!tracing::enabled!(Level::INFO));
    });
}

#[test]
fn verbose_enables_info() {
    with_default(build(1, false), || {
        assert!(tracing::enabled!(Level::INFO));
        assert!(!tracing::enabled!(Level::DEBUG));
    });
}

#[test]
fn debug_with_two_v() {
    with_default(build(2, false), || {
        assert!(tracing::enabled!(Level::DEBUG));
    });
}

#[test]
fn quiet_only_emits_errors() {
    with_default(build(2, true), || {
        assert!(tracing::enabled!(Level::ERROR));
        assert!(!tracing::enabled!(Level::WARN));
    });
}
