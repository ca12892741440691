//! Scan configuration and port lists

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Ports probed when none are configured
pub const DEFAULT_PORTS: &[u16] = &[
    80, 443, 22, 21, 23, 25, 53, 110, 143, 3306, 5432, 3389, 445, 8080,
];

/// Default per-probe timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default number of hosts handled concurrently
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one port must be specified")]
    NoPorts,
    #[error("Invalid port number {0}: ports must be between 1 and 65535")]
    InvalidPort(u32),
    #[error("Timeout must be a positive number of milliseconds")]
    InvalidTimeout,
    #[error("Concurrency limit must be a positive number")]
    InvalidConcurrency,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortListError {
    #[error("Invalid port entry: {0:?}")]
    InvalidEntry(String),
    #[error("Invalid port span {start}-{end}")]
    InvalidSpan { start: u16, end: u16 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parameters shared by every stage of a scan.
///
/// Treated as read-only once a scan starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Candidate ports for the liveness sweep and the port scan
    pub ports: Vec<u16>,
    /// Per-probe timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum number of hosts in flight
    pub concurrency_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the invariants every scan relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::NoPorts);
        }
        if self.ports.contains(&0) {
            return Err(ConfigError::InvalidPort(0));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

/// Parse a port list such as `"22,80,443"` or `"20-25,8080"`.
///
/// Order is preserved and duplicates are kept.
pub fn parse_ports(s: &str) -> Result<Vec<u16>, PortListError> {
    let mut ports = Vec::new();

    for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('-') {
            Some((lo, hi)) => {
                let start = parse_port(lo)?;
                let end = parse_port(hi)?;
                if start > end {
                    return Err(PortListError::InvalidSpan { start, end });
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse_port(entry)?),
        }
    }

    if ports.is_empty() {
        return Err(ConfigError::NoPorts.into());
    }
    Ok(ports)
}

fn parse_port(s: &str) -> Result<u16, PortListError> {
    let s = s.trim();
    let value: u32 = s
        .parse()
        .map_err(|_| PortListError::InvalidEntry(s.to_string()))?;
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(value).into()),
    }
}
