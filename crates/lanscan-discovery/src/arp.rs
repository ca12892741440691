//! Neighbor (ARP) cache lookups

use anyhow::{bail, Result};
use async_trait::async_trait;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;
use std::process::Output;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

/// Upper bound on a single `ip`/`arp` invocation
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers whether the local neighbor cache holds a resolved hardware
/// address for an IPv4 address
#[async_trait]
pub trait NeighborTable: Send + Sync {
    async fn has_complete_entry(&self, addr: Ipv4Addr) -> Result<bool>;
}

/// Pick the neighbor table implementation for this platform
pub fn system_neighbor_table() -> Arc<dyn NeighborTable> {
    if cfg!(target_os = "linux") {
        Arc::new(IpNeighTable)
    } else {
        Arc::new(ArpCommandTable::new())
    }
}

/// One line of `ip neigh` output
#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: Option<MacAddr>,
    pub interface: String,
    pub state: ArpState,
}

impl ArpEntry {
    /// A hardware address is known and the kernel has not given up on it
    pub fn is_complete(&self) -> bool {
        self.mac.is_some() && !matches!(self.state, ArpState::Incomplete | ArpState::Failed)
    }
}

/// Neighbor Unreachability Detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpState {
    Reachable,
    Stale,
    Delay,
    Probe,
    Failed,
    Incomplete,
    Permanent,
    Noarp,
    Unknown,
}

/// Linux neighbor table via iproute2
#[derive(Debug, Clone, Copy, Default)]
pub struct IpNeighTable;

#[async_trait]
impl NeighborTable for IpNeighTable {
    async fn has_complete_entry(&self, addr: Ipv4Addr) -> Result<bool> {
        let target = addr.to_string();
        let output = run_query("ip", &["neigh", "show", &target]).await?;

        if !output.status.success() {
            bail!("ip neigh failed: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let complete = stdout
            .lines()
            .filter_map(parse_ip_neigh_line)
            .any(|entry| entry.ip == addr && entry.is_complete());

        trace!(ip = %addr, complete, "ip neigh lookup");
        Ok(complete)
    }
}

/// Neighbor table via the net-tools / BSD / Windows `arp` command
#[derive(Debug, Clone)]
pub struct ArpCommandTable {
    list_flag: &'static str,
}

impl ArpCommandTable {
    pub fn new() -> Self {
        let list_flag = if cfg!(target_os = "windows") { "-a" } else { "-n" };
        Self { list_flag }
    }
}

impl Default for ArpCommandTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NeighborTable for ArpCommandTable {
    async fn has_complete_entry(&self, addr: Ipv4Addr) -> Result<bool> {
        let target = addr.to_string();
        let output = run_query("arp", &[self.list_flag, &target]).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let complete = arp_output_has_mac(&stdout, addr);

        // Most `arp` builds exit non-zero when there is no entry
        if !complete && !output.status.success() {
            bail!("arp failed: {}", String::from_utf8_lossy(&output.stderr).trim());
        }

        trace!(ip = %addr, complete, "arp lookup");
        Ok(complete)
    }
}

async fn run_query(program: &str, args: &[&str]) -> Result<Output> {
    let child = Command::new(program).args(args).kill_on_drop(true).output();
    match tokio::time::timeout(QUERY_TIMEOUT, child).await {
        Ok(output) => Ok(output?),
        Err(_) => bail!("{} did not finish within {:?}", program, QUERY_TIMEOUT),
    }
}

/// Parse a line from `ip neigh show` output
pub fn parse_ip_neigh_line(line: &str) -> Option<ArpEntry> {
    // "192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE"
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let ip = Ipv4Addr::from_str(parts[0]).ok()?;
    let dev_idx = parts.iter().position(|&p| p == "dev")?;
    let interface = parts.get(dev_idx + 1)?.to_string();

    // INCOMPLETE and FAILED entries carry no lladdr
    let mac = parts
        .iter()
        .position(|&p| p == "lladdr")
        .and_then(|idx| parts.get(idx + 1))
        .and_then(|s| parse_mac_token(s));

    let state = parts.last().map(|s| parse_arp_state(s)).unwrap_or(ArpState::Unknown);

    Some(ArpEntry {
        ip,
        mac,
        interface,
        state,
    })
}

fn parse_arp_state(s: &str) -> ArpState {
    match s.to_uppercase().as_str() {
        "REACHABLE" => ArpState::Reachable,
        "STALE" => ArpState::Stale,
        "DELAY" => ArpState::Delay,
        "PROBE" => ArpState::Probe,
        "FAILED" => ArpState::Failed,
        "INCOMPLETE" => ArpState::Incomplete,
        "PERMANENT" => ArpState::Permanent,
        "NOARP" => ArpState::Noarp,
        _ => ArpState::Unknown,
    }
}

/// True when some line of `arp` output names `addr` and carries a MAC.
///
/// Understands the BSD/macOS form `? (10.0.0.1) at a:b:c:d:e:f on en0`, the
/// net-tools table `10.0.0.1 ether aa:bb:cc:dd:ee:ff C eth0` and the Windows
/// table `10.0.0.1  aa-bb-cc-dd-ee-ff  dynamic`.
pub fn arp_output_has_mac(output: &str, addr: Ipv4Addr) -> bool {
    let target = addr.to_string();
    output.lines().any(|line| {
        let tokens: Vec<&str> = line
            .split_whitespace()
            .map(|t| t.trim_matches(|c| c == '(' || c == ')'))
            .collect();
        tokens.iter().any(|t| *t == target) && tokens.iter().any(|t| parse_mac_token(t).is_some())
    })
}

/// Parse six `:` or `-` separated groups of one or two hex digits
fn parse_mac_token(token: &str) -> Option<MacAddr> {
    let normalized = token.replace('-', ":");
    let groups: Vec<&str> = normalized.split(':').collect();
    let well_formed = groups.len() == 6
        && groups
            .iter()
            .all(|g| (1..=2).contains(&g.len()) && g.chars().all(|c| c.is_ascii_hexdigit()));

    if !well_formed {
        return None;
    }
    MacAddr::from_str(&normalized).ok()
}
