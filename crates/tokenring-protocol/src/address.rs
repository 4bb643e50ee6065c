//! Peer listening endpoints.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A `(host, port)` pair naming one peer's listening endpoint.
///
/// Hosts are compared as written, so `localhost:6001` and `127.0.0.1:6001`
/// are different ring members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingAddress {
    host: String,
    port: u16,
}

impl RingAddress {
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
}

impl FromStr for RingAddress {
    type Err = ProtocolError;

    /// Parses `host:port`, `[v6-host]:port` included.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ProtocolError::InvalidAddress {
            addr: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| invalid(&format!("bad port: {e}")))?;

        Ok(Self::new(host, port))
    }
}

impl From<SocketAddr> for RingAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for RingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
