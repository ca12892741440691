//! IPv4 host ranges
//!
//! A [`HostRange`] is an inclusive `start..=end` span of IPv4 addresses. It can
//! be parsed from a single address, a dash range or CIDR notation, and is
//! expanded on demand into an ascending sequence of addresses.

use pnet::ipnetwork::Ipv4Network;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Start address {start} is greater than end address {end}")]
    Inverted { start: Ipv4Addr, end: Ipv4Addr },
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),
}

/// Inclusive range of IPv4 addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HostRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl HostRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, RangeError> {
        if u32::from(start) > u32::from(end) {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range holding exactly one address
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Usable host addresses of a CIDR block.
    ///
    /// Network and broadcast addresses are skipped for prefixes up to /30;
    /// /31 and /32 blocks have no such addresses and are kept whole.
    pub fn from_cidr(network: Ipv4Addr, prefix_len: u8) -> Result<Self, RangeError> {
        let block = Ipv4Network::new(network, prefix_len)
            .map_err(|_| RangeError::InvalidCidr(format!("{}/{}", network, prefix_len)))?;

        let first = u32::from(block.network());
        let last = u32::from(block.broadcast());

        if block.prefix() >= 31 {
            return Self::new(Ipv4Addr::from(first), Ipv4Addr::from(last));
        }
        Self::new(Ipv4Addr::from(first + 1), Ipv4Addr::from(last - 1))
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Number of addresses in the range
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    /// A range always holds at least one address
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let n = u32::from(addr);
        n >= u32::from(self.start) && n <= u32::from(self.end)
    }

    /// Ascending iterator over every address; each call starts over
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

impl fmt::Display for HostRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for HostRange {
    type Err = RangeError;

    /// Accepted forms:
    /// * `192.168.1.10`
    /// * `192.168.1.10-192.168.1.50`
    /// * `192.168.1.10-50` (last octet shorthand)
    /// * `192.168.1.0/24`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((base, prefix)) = s.split_once('/') {
            let network = parse_addr(base)?;
            let prefix_len: u8 = prefix
                .trim()
                .parse()
                .map_err(|_| RangeError::InvalidCidr(s.to_string()))?;
            return Self::from_cidr(network, prefix_len);
        }

        if let Some((first, last)) = s.split_once('-') {
            let start = parse_addr(first)?;
            let last = last.trim();
            let end = if last.contains('.') {
                parse_addr(last)?
            } else {
                let octet: u8 = last
                    .parse()
                    .map_err(|_| RangeError::InvalidAddress(last.to_string()))?;
                let [a, b, c, _] = start.octets();
                Ipv4Addr::new(a, b, c, octet)
            };
            return Self::new(start, end);
        }

        Ok(Self::single(parse_addr(s)?))
    }
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, RangeError> {
    let s = s.trim();
    Ipv4Addr::from_str(s).map_err(|_| RangeError::InvalidAddress(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_rejected() {
        let err = HostRange::new(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1)).unwrap_err();
        assert!(matches!(err, RangeError::Inverted { .. }));
    }

    #[test]
    fn test_addresses_ascending_inclusive() {
        let range = HostRange::new(Ipv4Addr::new(10, 0, 0, 254), Ipv4Addr::new(10, 0, 1, 1)).unwrap();
        let addrs: Vec<Ipv4Addr> = range.addresses().collect();
        assert_eq!(
            addrs,
            vec![
                Ipv4Addr::new(10, 0, 0, 254),
                Ipv4Addr::new(10, 0, 0, 255),
                Ipv4Addr::new(10, 0, 1, 0),
                Ipv4Addr::new(10, 0, 1, 1),
            ]
        );
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_addresses_restartable() {
        let range: HostRange = "10.0.0.1-3".parse().unwrap();
        let first: Vec<_> = range.addresses().collect();
        let second: Vec<_> = range.addresses().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_full_address_space_len() {
        let range = HostRange::new(Ipv4Addr::new(0, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 255)).unwrap();
        assert_eq!(range.len(), 1u64 << 32);
    }

    #[test]
    fn test_parse_single() {
        let range: HostRange = "192.168.1.7".parse().unwrap();
        assert_eq!(range.start(), range.end());
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_parse_dash_range() {
        let range: HostRange = "192.168.1.1 - 192.168.1.254".parse().unwrap();
        assert_eq!(range.start(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(range.end(), Ipv4Addr::new(192, 168, 1, 254));

        let short: HostRange = "192.168.1.10-20".parse().unwrap();
        assert_eq!(short.end(), Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn test_parse_inverted_dash_range() {
        assert!(matches!(
            "10.0.0.9-10.0.0.1".parse::<HostRange>(),
            Err(RangeError::Inverted { .. })
        ));
    }

    #[test]
    fn test_parse_cidr_skips_network_and_broadcast() {
        let range: HostRange = "192.168.1.77/24".parse().unwrap();
        assert_eq!(range.start(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(range.end(), Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn test_parse_small_cidr_blocks() {
        let host: HostRange = "10.1.2.3/32".parse().unwrap();
        assert_eq!(host.len(), 1);
        assert_eq!(host.start(), Ipv4Addr::new(10, 1, 2, 3));

        let pair: HostRange = "10.1.2.2/31".parse().unwrap();
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!("10.0.0".parse::<HostRange>(), Err(RangeError::InvalidAddress(_))));
        assert!(matches!("10.0.0.0/33".parse::<HostRange>(), Err(RangeError::InvalidCidr(_))));
        assert!(matches!("10.0.0.1-300".parse::<HostRange>(), Err(RangeError::InvalidAddress(_))));
    }

    #[test]
    fn test_display() {
        let range: HostRange = "10.0.0.1-10.0.0.3".parse().unwrap();
        assert_eq!(range.to_string(), "10.0.0.1-10.0.0.3");
        assert_eq!(HostRange::single(Ipv4Addr::new(10, 0, 0, 1)).to_string(), "10.0.0.1");
    }
}
