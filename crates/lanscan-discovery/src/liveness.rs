//! Host liveness cascade
//!
//! Techniques are tried cheapest first and the first positive answer wins:
//! ICMP echo, then the neighbor cache, then a TCP sweep of candidate ports.

use lanscan_core::{DetectionMethod, HostLiveness, ProbeOutcome};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::arp::NeighborTable;
use crate::executor::run_bounded;
use crate::ping::Pinger;
use crate::probe::PortProber;

/// Ceiling on the ping wait regardless of the configured timeout
pub const PING_TIMEOUT_CAP: Duration = Duration::from_millis(1000);

/// Pause after the ping so a reply's neighbor entry can land in the cache
pub const ARP_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Ports probed together in one step of the sweep
pub const SWEEP_BATCH_SIZE: usize = 5;

/// Ordered set of liveness checks sharing one set of capabilities
#[derive(Clone)]
pub struct LivenessCascade {
    pinger: Arc<dyn Pinger>,
    neighbors: Arc<dyn NeighborTable>,
    prober: Arc<dyn PortProber>,
}

impl LivenessCascade {
    pub fn new(
        pinger: Arc<dyn Pinger>,
        neighbors: Arc<dyn NeighborTable>,
        prober: Arc<dyn PortProber>,
    ) -> Self {
        Self {
            pinger,
            neighbors,
            prober,
        }
    }

    pub async fn is_alive(&self, addr: Ipv4Addr, ports: &[u16], timeout: Duration) -> HostLiveness {
        if self.ping_replies(addr, timeout.min(PING_TIMEOUT_CAP)).await {
            debug!(ip = %addr, "Host answered ping");
            return HostLiveness::alive(addr, DetectionMethod::Ping);
        }

        tokio::time::sleep(ARP_SETTLE_DELAY).await;
        if self.neighbor_resolved(addr).await {
            debug!(ip = %addr, "Host present in neighbor table");
            return HostLiveness::alive(addr, DetectionMethod::Arp);
        }

        if has_open_port(&self.prober, addr, ports, timeout).await {
            debug!(ip = %addr, "Host has an open port");
            return HostLiveness::alive(addr, DetectionMethod::PortScan);
        }

        HostLiveness::dead(addr)
    }

    async fn ping_replies(&self, addr: Ipv4Addr, limit: Duration) -> bool {
        match self.pinger.ping(addr, limit).await {
            Ok(replied) => replied,
            Err(e) => {
                debug!(ip = %addr, error = %e, "Ping unavailable");
                false
            }
        }
    }

    async fn neighbor_resolved(&self, addr: Ipv4Addr) -> bool {
        match self.neighbors.has_complete_entry(addr).await {
            Ok(found) => found,
            Err(e) => {
                debug!(ip = %addr, error = %e, "Neighbor lookup failed");
                false
            }
        }
    }
}

/// Probe `ports` in batches, stopping after the first batch with an open port
async fn has_open_port(
    prober: &Arc<dyn PortProber>,
    addr: Ipv4Addr,
    ports: &[u16],
    timeout: Duration,
) -> bool {
    for batch in ports.chunks(SWEEP_BATCH_SIZE) {
        let prober = Arc::clone(prober);
        let outcomes = run_bounded(batch.to_vec(), SWEEP_BATCH_SIZE, move |port| {
            let prober = Arc::clone(&prober);
            async move { Ok(prober.probe(IpAddr::V4(addr), port, timeout).await) }
        })
        .await;

        if outcomes.into_iter().flatten().any(ProbeOutcome::is_open) {
            return true;
        }
    }
    false
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Pinger answering for a fixed set of hosts, or failing outright
    #[derive(Default)]
    pub struct FakePinger {
        pub replies: HashSet<Ipv4Addr>,
        pub broken: bool,
        pub timeouts: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pinger for FakePinger {
        async fn ping(&self, addr: Ipv4Addr, timeout: Duration) -> Result<bool> {
            self.timeouts.lock().unwrap().push(timeout);
            if self.broken {
                bail!("ping: command not found");
            }
            Ok(self.replies.contains(&addr))
        }
    }

    #[derive(Default)]
    pub struct FakeNeighbors {
        pub known: HashSet<Ipv4Addr>,
        pub broken: bool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl NeighborTable for FakeNeighbors {
        async fn has_complete_entry(&self, addr: Ipv4Addr) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                bail!("arp: permission denied");
            }
            Ok(self.known.contains(&addr))
        }
    }

    /// Prober with a fixed set of open `(host, port)` pairs
    #[derive(Default)]
    pub struct FakeProber {
        pub open: HashSet<(Ipv4Addr, u16)>,
        pub probed: Mutex<Vec<(Ipv4Addr, u16)>>,
    }

    impl FakeProber {
        pub fn with_open(open: impl IntoIterator<Item = (Ipv4Addr, u16)>) -> Self {
            Self {
                open: open.into_iter().collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.probed.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PortProber for FakeProber {
        async fn probe(&self, addr: IpAddr, port: u16, _timeout: Duration) -> ProbeOutcome {
            let IpAddr::V4(v4) = addr else {
                return ProbeOutcome::Unreachable;
            };
            self.probed.lock().unwrap().push((v4, port));
            if self.open.contains(&(v4, port)) {
                ProbeOutcome::Open
            } else {
                ProbeOutcome::Closed
            }
        }
    }
}
