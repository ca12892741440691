//! lanscan Discovery - Host liveness detection and TCP port scanning
//!
//! This crate provides:
//! - A bounded-concurrency executor used for every fan-out
//! - TCP port probing with three-way outcome classification
//! - A liveness cascade (ping, neighbor cache, port sweep)
//! - A scanner that discovers hosts in a range and enumerates their open ports
//!
//! OS facilities sit behind the [`Pinger`], [`NeighborTable`] and
//! [`PortProber`] traits so the scanning logic never branches on platform.

pub mod arp;
pub mod executor;
pub mod liveness;
pub mod ping;
pub mod port_scan;
pub mod probe;
pub mod scanner;
pub mod timeout;

pub use arp::{system_neighbor_table, ArpCommandTable, IpNeighTable, NeighborTable};
pub use executor::run_bounded;
pub use liveness::LivenessCascade;
pub use ping::{Pinger, SystemPinger};
pub use port_scan::scan_ports;
pub use probe::{probe_port, PortProber, TcpPortProber};
pub use scanner::{NetworkScanner, ScanError};
pub use timeout::{with_timeout, RetryPolicy};
