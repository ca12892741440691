//! Scan orchestration: range discovery followed by per-host port scans

use chrono::Utc;
use lanscan_core::{
    ConfigError, DiscoveredHost, HostPorts, HostRange, HostReport, ScanConfig, ScanReport,
};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::arp::{system_neighbor_table, NeighborTable};
use crate::executor::run_bounded;
use crate::liveness::LivenessCascade;
use crate::ping::{Pinger, SystemPinger};
use crate::port_scan::scan_ports;
use crate::probe::{PortProber, TcpPortProber};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Host discovery and port scanning over a set of OS capabilities
#[derive(Clone)]
pub struct NetworkScanner {
    cascade: LivenessCascade,
    prober: Arc<dyn PortProber>,
}

impl NetworkScanner {
    pub fn new(
        pinger: Arc<dyn Pinger>,
        neighbors: Arc<dyn NeighborTable>,
        prober: Arc<dyn PortProber>,
    ) -> Self {
        Self {
            cascade: LivenessCascade::new(pinger, neighbors, Arc::clone(&prober)),
            prober,
        }
    }

    /// Scanner backed by the system `ping`, the platform neighbor table and
    /// real TCP connects
    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemPinger::new()),
            system_neighbor_table(),
            Arc::new(TcpPortProber),
        )
    }

    /// Run the liveness cascade over every address in `range`.
    ///
    /// Returns the live hosts sorted by address.
    pub async fn discover_hosts(
        &self,
        range: &HostRange,
        config: &ScanConfig,
    ) -> Result<Vec<DiscoveredHost>, ScanError> {
        config.validate()?;

        info!(
            range = %range,
            hosts = range.len(),
            concurrency = config.concurrency_limit,
            "Starting host discovery"
        );

        let ports: Arc<[u16]> = config.ports.clone().into();
        let timeout = config.timeout();
        let cascade = self.cascade.clone();

        let verdicts = run_bounded(range.addresses(), config.concurrency_limit, move |addr| {
            let cascade = cascade.clone();
            let ports = Arc::clone(&ports);
            async move { Ok(cascade.is_alive(addr, &ports, timeout).await) }
        })
        .await;

        let mut hosts: Vec<DiscoveredHost> = verdicts
            .into_iter()
            .flatten()
            .filter(|v| v.is_alive() && range.contains(v.address()))
            .map(|v| DiscoveredHost {
                address: v.address(),
                method: v.method(),
            })
            .collect();
        hosts.sort_by_key(|h| h.address);
        hosts.dedup_by_key(|h| h.address);

        info!("Discovery complete: {} of {} hosts alive", hosts.len(), range.len());
        Ok(hosts)
    }

    /// Enumerate the open ports of one host
    pub async fn scan_host_ports(
        &self,
        addr: Ipv4Addr,
        config: &ScanConfig,
    ) -> Result<HostPorts, ScanError> {
        config.validate()?;

        let mut open_ports = scan_ports(&self.prober, addr, &config.ports, config.timeout()).await;
        open_ports.sort_unstable();
        open_ports.dedup();

        Ok(HostPorts {
            address: addr,
            open_ports,
        })
    }

    /// Discover live hosts in `range`, then scan each of them for open ports
    pub async fn scan(&self, range: &HostRange, config: &ScanConfig) -> Result<ScanReport, ScanError> {
        config.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();

        let discovered = self.discover_hosts(range, config).await?;
        debug!(hosts = discovered.len(), "Starting port phase");

        let prober = Arc::clone(&self.prober);
        let ports: Arc<[u16]> = config.ports.clone().into();
        let timeout = config.timeout();
        let targets: Vec<Ipv4Addr> = discovered.iter().map(|h| h.address).collect();

        let scanned = run_bounded(targets, config.concurrency_limit, move |addr| {
            let prober = Arc::clone(&prober);
            let ports = Arc::clone(&ports);
            async move {
                let open = scan_ports(&prober, addr, &ports, timeout).await;
                Ok((addr, open))
            }
        })
        .await;

        let mut open_by_host: BTreeMap<Ipv4Addr, Vec<u16>> = scanned.into_iter().flatten().collect();

        let hosts: Vec<HostReport> = discovered
            .into_iter()
            .map(|host| {
                let mut open_ports = open_by_host.remove(&host.address).unwrap_or_else(|| {
                    warn!(ip = %host.address, "No port results for host");
                    Vec::new()
                });
                open_ports.sort_unstable();
                open_ports.dedup();
                HostReport {
                    address: host.address,
                    method: host.method,
                    open_ports,
                }
            })
            .collect();

        let report = ScanReport {
            range: *range,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            hosts,
        };

        info!(
            "Scan complete: {} hosts alive, {} open ports in {} ms",
            report.hosts.len(),
            report.open_port_count(),
            report.elapsed_ms
        );
        Ok(report)
    }
}
