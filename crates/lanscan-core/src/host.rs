//! Probe outcomes and per-host scan records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::range::HostRange;

/// Classification of a single TCP connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// The handshake completed
    Open,
    /// The peer refused or reset the connection; something is there
    Closed,
    /// No conclusive signal (timeout, unreachable, anything unclassified)
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Which liveness check produced a positive verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    /// Host answered an ICMP echo
    Ping,
    /// Host has a complete entry in the local neighbor cache
    Arp,
    /// Host accepted a connection on one of the candidate ports
    PortScan,
    /// No check succeeded
    None,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "ping",
            Self::Arp => "arp",
            Self::PortScan => "port-scan",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Verdict of the liveness cascade for one address.
///
/// `method` is `None` exactly when the host is not alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostLiveness {
    address: Ipv4Addr,
    is_alive: bool,
    method: DetectionMethod,
}

impl HostLiveness {
    /// A positive verdict; `DetectionMethod::None` yields a dead verdict
    pub fn alive(address: Ipv4Addr, method: DetectionMethod) -> Self {
        Self {
            address,
            is_alive: method != DetectionMethod::None,
            method,
        }
    }

    pub fn dead(address: Ipv4Addr) -> Self {
        Self {
            address,
            is_alive: false,
            method: DetectionMethod::None,
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }
}

/// An address that passed the liveness cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub address: Ipv4Addr,
    pub method: DetectionMethod,
}

/// Open ports found on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPorts {
    pub address: Ipv4Addr,
    pub open_ports: Vec<u16>,
}

/// Combined discovery and port information for one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostReport {
    pub address: Ipv4Addr,
    pub method: DetectionMethod,
    /// Sorted ascending
    pub open_ports: Vec<u16>,
}

/// Result of a full scan over a range
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub range: HostRange,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Sorted ascending by address
    pub hosts: Vec<HostReport>,
}

impl ScanReport {
    pub fn open_port_count(&self) -> usize {
        self.hosts.iter().map(|h| h.open_ports.len()).sum()
    }
}
