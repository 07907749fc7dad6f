// crates/transport/src/address.rs
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Host and port a server listens on.
///
/// The family is derived from the host: anything containing a colon is an
/// IPv6 literal, everything else (including host names and the empty
/// wildcard host) is IPv4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn family(&self) -> AddressFamily {
        if self.host.contains(':') {
            AddressFamily::V6
        } else {
            AddressFamily::V4
        }
    }

    /// Resolve to a socket address of this address' family.
    pub fn resolve(&self) -> io::Result<SocketAddr> {
        let family = self.family();
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            let ip = match family {
                AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            };
            return Ok(SocketAddr::new(ip, self.port));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        (host, self.port)
            .to_socket_addrs()?
            .find(|addr| match family {
                AddressFamily::V4 => addr.is_ipv4(),
                AddressFamily::V6 => addr.is_ipv6(),
            })
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no {family} address for {host}"),
                )
            })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family() {
            AddressFamily::V6 if !self.host.starts_with('[') => {
                write!(f, "[{}]:{}", self.host, self.port)
            }
            _ => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_follows_colon() {
        assert_eq!(Address::new("::1", 0).family(), AddressFamily::V6);
        assert_eq!(Address::new("127.0.0.1", 0).family(), AddressFamily::V4);
        assert_eq!(Address::new("localhost", 0).family(), AddressFamily::V4);
        assert_eq!(Address::new("", 0).family(), AddressFamily::V4);
    }

    #[test]
    fn empty_host_is_wildcard() {
        let addr = Address::new("", 783).resolve().unwrap();
        assert_eq!(addr, "0.0.0.0:783".parse().unwrap());
    }

    #[test]
    fn literals_resolve_without_lookup() {
        let addr = Address::new("::1", 9).resolve().unwrap();
        assert_eq!(addr, "[::1]:9".parse().unwrap());
        let addr = Address::new("[::]", 9).resolve().unwrap();
        assert_eq!(addr, "[::]:9".parse().unwrap());
    }

    #[test]
    fn display_brackets_ipv6() {
        assert_eq!(Address::new("::1", 80).to_string(), "[::1]:80");
        assert_eq!(Address::new("0.0.0.0", 80).to_string(), "0.0.0.0:80");
    }
}
