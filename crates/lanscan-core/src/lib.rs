//! lanscan Core - Core types for host discovery and port scanning
//!
//! This crate provides the data model shared by the scanner and its front ends:
//! - Host ranges parsed from addresses, dash ranges and CIDR blocks
//! - Scan configuration and port lists
//! - Probe outcomes, detection methods and per-host results

pub mod config;
pub mod host;
pub mod range;

pub use config::{
    parse_ports, ConfigError, PortListError, ScanConfig, DEFAULT_CONCURRENCY_LIMIT,
    DEFAULT_PORTS, DEFAULT_TIMEOUT_MS,
};
pub use host::{
    DetectionMethod, DiscoveredHost, HostLiveness, HostPorts, HostReport, ProbeOutcome,
    ScanReport,
};
pub use range::{HostRange, RangeError};
