// crates/daemon/src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use transport::TransportKind;

/// Free-form `key = value` pairs from the `[service]` section, handed to the
/// service on every configuration load.
pub type ServiceSection = BTreeMap<String, String>;

/// Settings read from `preforkd.conf`. Every field is optional so command
/// line flags can fill the gaps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub protocol: Option<TransportKind>,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub daemonize: Option<bool>,
    pub reuse_address: Option<bool>,
    pub ipv6_only: Option<bool>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub service: ServiceSection,
}

impl DaemonConfig {
    pub fn service_value(&self, key: &str) -> Option<&str> {
        self.service.get(key).map(String::as_str)
    }
}
