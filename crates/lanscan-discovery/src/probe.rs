//! TCP port-state probing

use async_trait::async_trait;
use lanscan_core::ProbeOutcome;
use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Source of port-state verdicts for a single `(address, port)` pair
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> ProbeOutcome;
}

/// Real prober backed by a TCP connect attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortProber;

#[async_trait]
impl PortProber for TcpPortProber {
    async fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> ProbeOutcome {
        probe_port(addr, port, timeout).await
    }
}

/// Attempt one TCP connection and classify the result.
///
/// Never fails. The socket is closed on every path: an established stream is
/// dropped right away, and a connect that loses the race against `limit` is
/// dropped together with its future.
pub async fn probe_port(addr: IpAddr, port: u16, limit: Duration) -> ProbeOutcome {
    let target = SocketAddr::new(addr, port);

    let outcome = match timeout(limit, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Open
        }
        Ok(Err(e)) => classify_connect_error(&e),
        Err(_elapsed) => ProbeOutcome::Unreachable,
    };

    trace!(target = %target, outcome = ?outcome, "Port probe finished");
    outcome
}

/// Map a failed connect to an outcome.
///
/// Only an active refusal or reset proves something answered. Host and
/// network unreachable, host down, timeouts and everything else stay
/// inconclusive.
pub fn classify_connect_error(err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
            ProbeOutcome::Closed
        }
        _ => ProbeOutcome::Unreachable,
    }
}
