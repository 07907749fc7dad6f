use logging::{LogFormat, SubscriberConfig, subscriber};
use serde_json::Value;
use tempfile::tempdir;
use tracing::subscriber::with_default;
use tracing::{warn, warn_span};

fn json_lines(emit: impl FnOnce()) -> Vec<Value> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.json");
    let cfg = SubscriberConfig::builder()
        .format(LogFormat::Json)
        .log_file(Some((path.clone(), Some("json".to_string()))))
        .colored(false)
        .build();
    with_default(subscriber(cfg).unwrap(), emit);
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn json_file_records_pid_message_and_fields() {
    let lines = json_lines(|| warn!(target: "test", worker = 7, "worker exited"));
    let v = &lines[0];
    assert_eq!(v["level"], "WARN");
    assert_eq!(v["target"], "test");
    assert_eq!(v["pid"], std::process::id());
    assert_eq!(v["message"], "worker exited");
    assert_eq!(v["fields"]["worker"], 7);
    assert!(v.get("spans").is_none());
    assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn json_lifts_peer_and_lists_enclosing_spans() {
    let lines = json_lines(|| {
        let _worker = warn_span!("worker").entered();
        warn!(target: "test", peer = "127.0.0.1:9", "request failed");
    });
    let v = &lines[0];
    assert_eq!(v["peer"], "127.0.0.1:9");
    assert_eq!(v["spans"], serde_json::json!(["worker"]));
    assert!(v.get("fields").is_none());
}
