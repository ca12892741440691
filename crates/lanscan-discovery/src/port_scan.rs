//! Open-port enumeration for a single host

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::executor::run_bounded;
use crate::probe::PortProber;

/// Probes in flight per host
pub const PORT_SCAN_CONCURRENCY: usize = 5;

/// Probe every port and return the open ones, in completion order
pub async fn scan_ports(
    prober: &Arc<dyn PortProber>,
    addr: Ipv4Addr,
    ports: &[u16],
    timeout: Duration,
) -> Vec<u16> {
    let prober = Arc::clone(prober);
    let outcomes = run_bounded(ports.to_vec(), PORT_SCAN_CONCURRENCY, move |port| {
        let prober = Arc::clone(&prober);
        async move {
            let outcome = prober.probe(IpAddr::V4(addr), port, timeout).await;
            Ok((port, outcome))
        }
    })
    .await;

    let open: Vec<u16> = outcomes
        .into_iter()
        .flatten()
        .filter(|(_, outcome)| outcome.is_open())
        .map(|(port, _)| port)
        .collect();

    debug!(ip = %addr, probed = ports.len(), open = open.len(), "Port scan finished");
    open
}
