//! Local subnet detection for `--ip lan`

use anyhow::{Context, Result};
use lanscan_core::HostRange;
use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Prefix assumed when an interface reports no netmask
const FALLBACK_PREFIX: u8 = 24;

/// Above this many addresses a scan of the local subnet gets a warning
const LARGE_SUBNET: u64 = 4096;

/// IPv4 configuration of one local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSubnet {
    pub name: String,
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
}

impl LocalSubnet {
    pub fn from_netmask(name: &str, ip: Ipv4Addr, netmask: Option<Ipv4Addr>) -> Self {
        let prefix_len = netmask
            .map(|m| u32::from(m).count_ones() as u8)
            .unwrap_or(FALLBACK_PREFIX);
        Self {
            name: name.to_string(),
            ip,
            prefix_len,
        }
    }

    /// Usable host addresses of this subnet
    pub fn range(&self) -> Result<HostRange> {
        Ok(HostRange::from_cidr(self.ip, self.prefix_len)?)
    }
}

/// Loopback, container bridges and virtual ethernet pairs
fn is_virtual(name: &str, ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_link_local()
        || name.starts_with("lo")
        || name.starts_with("docker")
        || name.starts_with("br-")
        || name.starts_with("veth")
}

/// IPv4 subnets of the physical-looking interfaces, in OS order
pub fn local_subnets() -> Result<Vec<LocalSubnet>> {
    let interfaces = NetworkInterface::show().context("Failed to list network interfaces")?;

    let subnets = interfaces
        .into_iter()
        .flat_map(|iface| {
            let name = iface.name;
            iface.addr.into_iter().filter_map(move |addr| match addr {
                Addr::V4(v4) => Some(LocalSubnet::from_netmask(&name, v4.ip, v4.netmask)),
                Addr::V6(_) => None,
            })
        })
        .filter(|subnet| !is_virtual(&subnet.name, subnet.ip))
        .collect();

    Ok(subnets)
}

/// Range covering the subnet of the first usable interface
pub fn detect_lan_range() -> Result<HostRange> {
    let subnets = local_subnets()?;
    let Some(subnet) = subnets.first() else {
        anyhow::bail!("No non-loopback IPv4 interface found; pass --ip explicitly");
    };

    let range = subnet.range()?;
    debug!(
        interface = %subnet.name,
        ip = %subnet.ip,
        prefix = subnet.prefix_len,
        "Detected local subnet"
    );
    if range.len() > LARGE_SUBNET {
        warn!(
            interface = %subnet.name,
            hosts = range.len(),
            "Local subnet is large, scan may take a long time"
        );
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_from_netmask() {
        let subnet = LocalSubnet::from_netmask(
            "eth0",
            Ipv4Addr::new(192, 168, 186, 42),
            Some(Ipv4Addr::new(255, 255, 255, 0)),
        );
        assert_eq!(subnet.prefix_len, 24);
        let range = subnet.range().unwrap();
        assert_eq!(range.start(), Ipv4Addr::new(192, 168, 186, 1));
        assert_eq!(range.end(), Ipv4Addr::new(192, 168, 186, 254));
    }

    #[test]
    fn test_missing_netmask_falls_back() {
        let subnet = LocalSubnet::from_netmask("wlan0", Ipv4Addr::new(10, 1, 2, 3), None);
        assert_eq!(subnet.prefix_len, FALLBACK_PREFIX);
        assert_eq!(subnet.range().unwrap().len(), 254);
    }

    #[test]
    fn test_virtual_interfaces_skipped() {
        let lan = Ipv4Addr::new(192, 168, 1, 5);
        assert!(is_virtual("lo", Ipv4Addr::LOCALHOST));
        assert!(is_virtual("docker0", Ipv4Addr::new(172, 17, 0, 1)));
        assert!(is_virtual("br-1a2b", lan));
        assert!(is_virtual("veth12ab", lan));
        assert!(is_virtual("eth0", Ipv4Addr::new(169, 254, 3, 4)));
        assert!(!is_virtual("eth0", lan));
        assert!(!is_virtual("en0", lan));
    }
}
