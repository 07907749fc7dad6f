// crates/daemon/src/config/parser.rs

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::model::DaemonConfig;
use super::validator::{parse_bool, parse_protocol, validate_config};

const DEFAULT_CONFIG_PATH: &str = "/etc/preforkd.conf";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Global,
    Service,
}

fn strip_comment(raw: &str) -> String {
    let mut line = String::new();
    let mut in_quotes: Option<char> = None;
    let mut prev_ws = true;
    for c in raw.chars() {
        match c {
            '"' | '\'' => {
                if let Some(q) = in_quotes {
                    if c == q {
                        in_quotes = None;
                    }
                } else {
                    in_quotes = Some(c);
                }
                line.push(c);
                prev_ws = false;
            }
            '#' | ';' if in_quotes.is_none() && prev_ws => break,
            c => {
                prev_ws = c.is_whitespace();
                line.push(c);
            }
        }
    }
    line
}

fn unquote(val: &str) -> &str {
    let quoted = val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')));
    if quoted { &val[1..val.len() - 1] } else { val }
}

fn invalid(lineno: usize, msg: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("line {lineno}: {msg}"))
}

pub fn parse_config(contents: &str) -> io::Result<DaemonConfig> {
    let mut cfg = DaemonConfig::default();
    let mut section = Section::Global;
    for (idx, raw) in contents.lines().enumerate() {
        let lineno = idx + 1;
        let line = strip_comment(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim();
            if name.eq_ignore_ascii_case("service") {
                section = Section::Service;
            } else {
                return Err(invalid(lineno, format!("unknown section: [{name}]")));
            }
            continue;
        }
        let (key, val) = line
            .split_once('=')
            .ok_or_else(|| invalid(lineno, "missing value"))?;
        let val = unquote(val.trim()).to_string();

        if section == Section::Service {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(invalid(lineno, "missing key"));
            }
            cfg.service.insert(key, val);
            continue;
        }

        let key = key.trim().to_lowercase().replace(['-', '_'], " ");
        let wrap = |e: io::Error| invalid(lineno, e);
        match key.as_str() {
            "address" => cfg.address = Some(val),
            "port" => {
                cfg.port = Some(val.parse().map_err(|e| invalid(lineno, e))?);
            }
            "workers" => {
                cfg.workers = Some(val.parse().map_err(|e| invalid(lineno, e))?);
            }
            "protocol" => cfg.protocol = Some(parse_protocol(&val).map_err(wrap)?),
            "pid file" => cfg.pid_file = Some(PathBuf::from(val)),
            "log file" => cfg.log_file = Some(PathBuf::from(val)),
            "daemonize" => cfg.daemonize = Some(parse_bool(&val).map_err(wrap)?),
            "reuse address" => cfg.reuse_address = Some(parse_bool(&val).map_err(wrap)?),
            "ipv6 only" => cfg.ipv6_only = Some(parse_bool(&val).map_err(wrap)?),
            "stdout" => cfg.stdout = Some(PathBuf::from(val)),
            "stderr" => cfg.stderr = Some(PathBuf::from(val)),
            _ => return Err(invalid(lineno, format!("unknown option: {key}"))),
        }
    }
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn parse_config_file(path: &Path) -> io::Result<DaemonConfig> {
    let contents = fs::read_to_string(path).map_err(|e| {
        io::Error::new(e.kind(), format!("failed to read {}: {e}", path.display()))
    })?;
    parse_config(&contents)
}

/// Read the daemon configuration, falling back to `PREFORK_CONFIG_PATH` and
/// then `/etc/preforkd.conf` when no path is given.
pub fn load_config(path: Option<&Path>) -> io::Result<DaemonConfig> {
    let default;
    let path = match path {
        Some(p) => p,
        None => {
            default = env::var("PREFORK_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
            &default
        }
    };
    parse_config_file(path)
}
