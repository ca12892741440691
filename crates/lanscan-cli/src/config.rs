//! Configuration loading and validation

use anyhow::{Context, Result};
use lanscan_core::{parse_ports, HostRange, ScanConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Range scanned when neither the command line nor the file names one
pub const DEFAULT_RANGE: &str = "192.168.1.1-192.168.1.254";

/// Keyword selecting the subnet of the first local interface
const LAN_KEYWORD: &str = "lan";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSection,
}

/// `[scan]` table; every key is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanSection {
    /// Address, dash range, CIDR block or `lan`
    pub range: Option<String>,
    /// Comma-separated ports and spans, e.g. `"22,80,8000-8010"`
    pub ports: Option<String>,
    pub timeout_ms: Option<u64>,
    pub concurrency_limit: Option<usize>,
}

impl ScanSection {
    /// Values present in `overrides` win over ours
    pub fn merged_with(&self, overrides: &ScanSection) -> ScanSection {
        ScanSection {
            range: overrides.range.clone().or_else(|| self.range.clone()),
            ports: overrides.ports.clone().or_else(|| self.ports.clone()),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            concurrency_limit: overrides.concurrency_limit.or(self.concurrency_limit),
        }
    }
}

/// Where the addresses to scan come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeChoice {
    Explicit(HostRange),
    /// Resolved at startup from the local interfaces
    LocalSubnet,
}

/// Fully resolved, validated settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub range: RangeChoice,
    pub scan: ScanConfig,
}

/// Load configuration from file, or use defaults
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Fill gaps with defaults, parse and validate.
///
/// Nothing has been sent on the network when this fails.
pub fn resolve(section: &ScanSection) -> Result<Settings> {
    let defaults = ScanConfig::default();

    let range = parse_range_choice(section.range.as_deref().unwrap_or(DEFAULT_RANGE))?;

    let ports = match &section.ports {
        Some(list) => parse_ports(list).with_context(|| format!("Invalid port list {:?}", list))?,
        None => defaults.ports,
    };

    let scan = ScanConfig {
        ports,
        timeout_ms: section.timeout_ms.unwrap_or(defaults.timeout_ms),
        concurrency_limit: section.concurrency_limit.unwrap_or(defaults.concurrency_limit),
    };
    scan.validate()?;

    Ok(Settings { range, scan })
}

fn parse_range_choice(s: &str) -> Result<RangeChoice> {
    if s.trim().eq_ignore_ascii_case(LAN_KEYWORD) {
        return Ok(RangeChoice::LocalSubnet);
    }
    let range: HostRange = s.parse().with_context(|| format!("Invalid range {:?}", s))?;
    Ok(RangeChoice::Explicit(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanscan_core::{ConfigError, DEFAULT_PORTS};
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            range = "10.0.0.0/29"
            ports = "22,80,8000-8002"
            timeout_ms = 750
            concurrency_limit = 16
            "#,
        )
        .unwrap();

        let settings = resolve(&config.scan).unwrap();
        let expected = HostRange::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 6)).unwrap();
        assert_eq!(settings.range, RangeChoice::Explicit(expected));
        assert_eq!(settings.scan.ports, vec![22, 80, 8000, 8001, 8002]);
        assert_eq!(settings.scan.timeout_ms, 750);
        assert_eq!(settings.scan.concurrency_limit, 16);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        let settings = resolve(&config.scan).unwrap();

        assert_eq!(settings.range, RangeChoice::Explicit(DEFAULT_RANGE.parse().unwrap()));
        assert_eq!(settings.scan.ports, DEFAULT_PORTS.to_vec());
        assert_eq!(settings.scan.timeout_ms, 2000);
        assert_eq!(settings.scan.concurrency_limit, 50);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[scan]\ntimeout = 5\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_command_line_overrides_file() {
        let file = ScanSection {
            range: Some("10.0.0.1-10.0.0.20".into()),
            ports: Some("22".into()),
            timeout_ms: Some(900),
            concurrency_limit: None,
        };
        let cli = ScanSection {
            range: Some("10.0.0.5".into()),
            timeout_ms: Some(300),
            ..Default::default()
        };

        let settings = resolve(&file.merged_with(&cli)).unwrap();
        assert_eq!(
            settings.range,
            RangeChoice::Explicit(HostRange::single(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(settings.scan.ports, vec![22]);
        assert_eq!(settings.scan.timeout_ms, 300);
        assert_eq!(settings.scan.concurrency_limit, 50);
    }

    #[test]
    fn test_lan_keyword() {
        let section = ScanSection {
            range: Some("LAN".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&section).unwrap().range, RangeChoice::LocalSubnet);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let inverted = ScanSection {
            range: Some("10.0.0.9-10.0.0.1".into()),
            ..Default::default()
        };
        assert!(resolve(&inverted).is_err());

        let zero_timeout = ScanSection {
            timeout_ms: Some(0),
            ..Default::default()
        };
        let err = resolve(&zero_timeout).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::InvalidTimeout));

        let bad_ports = ScanSection {
            ports: Some("80,http".into()),
            ..Default::default()
        };
        assert!(resolve(&bad_ports).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("lanscan-test-does-not-exist.toml");
        let config = load_config(&path).unwrap();
        assert!(config.scan.range.is_none());
        assert!(config.scan.ports.is_none());
    }

    #[test]
    fn test_load_config_from_disk() {
        let path = std::env::temp_dir().join(format!("lanscan-test-{}.toml", std::process::id()));
        std::fs::write(&path, "[scan]\nports = \"443\"\n").unwrap();
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.scan.ports.as_deref(), Some("443"));
    }
}
