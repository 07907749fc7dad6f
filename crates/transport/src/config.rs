// crates/transport/src/config.rs
use std::time::Duration;

/// Socket options and loop tuning fixed at server construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub allow_reuse_address: bool,

    /// When false an IPv6 socket also accepts IPv4-mapped peers, if the
    /// platform lets us clear `IPV6_V6ONLY`.
    pub ipv6_only: bool,

    pub backlog: i32,

    /// How often the accept loop re-checks for a shutdown request.
    pub poll_interval: Duration,

    pub max_packet_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allow_reuse_address: true,
            ipv6_only: false,
            backlog: 128,
            poll_interval: Duration::from_millis(500),
            max_packet_size: 8192,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfigError(&'static str);

impl std::fmt::Display for ServerConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ServerConfigError {}

pub type Result<T> = std::result::Result<T, ServerConfigError>;

#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    cfg: ServerConfig,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl ServerConfigBuilder {
    pub fn allow_reuse_address(mut self, allow: bool) -> Self {
        self.cfg.allow_reuse_address = allow;
        self
    }

    pub fn ipv6_only(mut self, only: bool) -> Self {
        self.cfg.ipv6_only = only;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.cfg.backlog = backlog;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.cfg.poll_interval = interval;
        self
    }

    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.cfg.max_packet_size = size;
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        if self.cfg.poll_interval.is_zero() {
            return Err(ServerConfigError("poll interval must be nonzero"));
        }
        if self.cfg.max_packet_size == 0 {
            return Err(ServerConfigError("max packet size must be nonzero"));
        }
        if self.cfg.backlog <= 0 {
            return Err(ServerConfigError("backlog must be positive"));
        }
        Ok(self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reuse_address_and_dual_stack() {
        let cfg = ServerConfig::builder().build().unwrap();
        assert!(cfg.allow_reuse_address);
        assert!(!cfg.ipv6_only);
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = ServerConfig::builder()
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "poll interval must be nonzero");
    }

    #[test]
    fn rejects_zero_packet_size() {
        assert!(ServerConfig::builder().max_packet_size(0).build().is_err());
    }
}
