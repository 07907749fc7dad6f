// crates/logging/tests/log_file.rs

use logging::{LogFormat, SubscriberConfig, subscriber};
use tempfile::tempdir;
use tracing::info;
use tracing::subscriber::with_default;

#[test]
fn file_sink_writes_message_with_pid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let cfg = SubscriberConfig::builder()
        .format(LogFormat::Text)
        .verbose(1)
        .log_file(Some((path.clone(), None)))
        .colored(false)
        .build();
    with_default(subscriber(cfg).unwrap(), || {
        info!(target: "test", pid = 42, "forked worker");
    });
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains(&format!("prefork[{}]", std::process::id())));
    assert!(contents.contains("forked worker pid=42"));
}

#[test]
fn file_sink_honours_template() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let cfg = SubscriberConfig::builder()
        .verbose(1)
        .log_file(Some((path.clone(), Some("%l|%a|%m".to_string()))))
        .colored(false)
        .build();
    with_default(subscriber(cfg).unwrap(), || {
        info!(target: "test", peer = "127.0.0.1:9", "request failed");
    });
    let contents = std::fs::read_to_string(path).unwrap();
    assert_eq!(contents, "INFO|127.0.0.1:9|request failed peer=127.0.0.1:9\n");
}

#[test]
fn unwritable_log_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("log.txt");
    let cfg = SubscriberConfig::builder()
        .log_file(Some((path, None)))
        .build();
    assert!(subscriber(cfg).is_err());
}
