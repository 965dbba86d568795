//! Resolved object locations.

use std::fmt;

use serde::Serialize;

/// Port appended to every location unless configured otherwise.
pub const DEFAULT_SERVICE_PORT: u16 = 1094;

/// One device currently responsible for an object.
///
/// Both `ip` and `hostname` carry the service port suffix. Lists of locations
/// keep the cluster's order: the primary comes first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Location {
    pub ip: String,
    pub hostname: String,
    pub device_id: i64,
}

impl Location {
    /// Build a location from a bare IP and hostname.
    pub fn new(ip: &str, hostname: &str, port: u16, device_id: i64) -> Self {
        Self {
            ip: with_port(ip, port),
            hostname: with_port(hostname, port),
            device_id,
        }
    }

    /// Hostname without the port suffix. IPv6 literals come back without
    /// brackets.
    pub fn host(&self) -> &str {
        let host = self
            .hostname
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.hostname);
        host.strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(host)
    }

    /// Port suffix of the hostname, if it parses.
    pub fn port(&self) -> Option<u16> {
        self.hostname
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

fn with_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "osd-id={} ip={} host={}",
            self.device_id, self.ip, self.hostname
        )
    }
}
