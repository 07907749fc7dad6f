// crates/cli/src/echo.rs
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::RwLock;

use daemon::config::parse_config_file;
use tracing::{debug, info};
use transport::{Service, Transport};

const MAX_REQUEST: usize = 8192;

/// Replies with the request payload, preceded by the `prefix` key of the
/// configuration's `[service]` section.
#[derive(Debug, Default)]
pub struct EchoService {
    config: Option<PathBuf>,
    prefix: RwLock<String>,
}

impl EchoService {
    pub fn new(config: Option<PathBuf>) -> Self {
        Self {
            config,
            prefix: RwLock::new(String::new()),
        }
    }

    pub fn prefix(&self) -> String {
        self.prefix
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Service for EchoService {
    fn handle(&self, transport: &mut dyn Transport, peer: SocketAddr) -> io::Result<()> {
        let mut buf = vec![0u8; MAX_REQUEST];
        let n = transport.receive(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        debug!(%peer, bytes = n, "echo");
        let mut reply = self.prefix().into_bytes();
        reply.extend_from_slice(&buf[..n]);
        transport.send(&reply)
    }

    fn load_config(&self) -> io::Result<()> {
        let Some(path) = &self.config else {
            return Ok(());
        };
        let cfg = parse_config_file(path)?;
        let prefix = cfg.service_value("prefix").unwrap_or_default().to_string();
        info!(prefix = %prefix, "echo configuration loaded");
        *self.prefix.write().unwrap_or_else(|e| e.into_inner()) = prefix;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use transport::LocalPipeTransport;

    fn echo(svc: &EchoService, input: &[u8]) -> Vec<u8> {
        let mut t = LocalPipeTransport::new(Cursor::new(input.to_vec()), Vec::new());
        svc.handle(&mut t, "127.0.0.1:9".parse().unwrap()).unwrap();
        t.into_inner().1
    }

    #[test]
    fn echoes_without_config() {
        let svc = EchoService::new(None);
        svc.load_config().unwrap();
        assert_eq!(echo(&svc, b"ping"), b"ping");
        assert!(echo(&svc, b"").is_empty());
    }

    #[test]
    fn prefix_follows_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preforkd.conf");
        fs::write(&path, "[service]\nprefix = \"a: \"\n").unwrap();
        let svc = EchoService::new(Some(path.clone()));
        svc.load_config().unwrap();
        assert_eq!(echo(&svc, b"x"), b"a: x");

        fs::write(&path, "[service]\nprefix = b-\n").unwrap();
        svc.load_config().unwrap();
        assert_eq!(echo(&svc, b"x"), b"b-x");
    }

    #[test]
    fn broken_reload_keeps_previous_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preforkd.conf");
        fs::write(&path, "[service]\nprefix = ok \n").unwrap();
        let svc = EchoService::new(Some(path.clone()));
        svc.load_config().unwrap();
        fs::write(&path, "bogus = 1\n").unwrap();
        assert!(svc.load_config().is_err());
        assert_eq!(svc.prefix(), "ok");
    }
}
