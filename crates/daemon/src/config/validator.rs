// crates/daemon/src/config/validator.rs

use std::io;

use transport::TransportKind;

use super::model::DaemonConfig;

pub fn parse_bool(val: &str) -> io::Result<bool> {
    if ["1", "yes", "true", "on"]
        .iter()
        .any(|v| val.eq_ignore_ascii_case(v))
    {
        Ok(true)
    } else if ["0", "no", "false", "off"]
        .iter()
        .any(|v| val.eq_ignore_ascii_case(v))
    {
        Ok(false)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid boolean: {val}"),
        ))
    }
}

pub fn parse_protocol(val: &str) -> io::Result<TransportKind> {
    if val.eq_ignore_ascii_case("tcp") {
        Ok(TransportKind::Stream)
    } else if val.eq_ignore_ascii_case("udp") {
        Ok(TransportKind::Datagram)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid protocol: {val} (expected tcp or udp)"),
        ))
    }
}

pub fn validate_config(cfg: &DaemonConfig) -> io::Result<()> {
    if let (Some(true), Some(addr)) = (cfg.ipv6_only, cfg.address.as_deref()) {
        if !addr.contains(':') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ipv6 only set for an IPv4 address",
            ));
        }
    }
    Ok(())
}
