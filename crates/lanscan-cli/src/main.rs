//! lanscan - Main entry point
//!
//! Discovers live hosts on an IPv4 range and lists their open TCP ports.

mod config;
mod interfaces;
mod report;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use lanscan_core::{HostRange, ScanConfig};
use lanscan_discovery::NetworkScanner;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{RangeChoice, ScanSection};
use report::DiscoveryReport;

#[derive(Parser, Debug)]
#[command(name = "lanscan")]
#[command(about = "Discover live hosts on a LAN and scan their open TCP ports")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "lanscan.toml")]
    config: PathBuf,

    /// Address, range (a.b.c.d-e or a.b.c.d-w.x.y.z), CIDR block, or "lan"
    #[arg(long)]
    ip: Option<String>,

    /// Comma-separated ports and spans, e.g. 22,80,8000-8010
    #[arg(long)]
    ports: Option<String>,

    /// Per-probe timeout in milliseconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum number of hosts scanned concurrently
    #[arg(short = 'c', long)]
    concurrency_limit: Option<usize>,

    /// Only report which hosts are alive
    #[arg(long)]
    discover_only: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ScanSection {
        ScanSection {
            range: self.ip.clone(),
            ports: self.ports.clone(),
            timeout_ms: self.timeout,
            concurrency_limit: self.concurrency_limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("lanscan v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, command line wins over the file
    let file = config::load_config(&args.config)?;
    let settings = config::resolve(&file.scan.merged_with(&args.overrides()))?;

    let range = match settings.range {
        RangeChoice::Explicit(range) => range,
        RangeChoice::LocalSubnet => interfaces::detect_lan_range()?,
    };

    info!(
        range = %range,
        ports = settings.scan.ports.len(),
        timeout_ms = settings.scan.timeout_ms,
        concurrency = settings.scan.concurrency_limit,
        "Configuration loaded"
    );

    let scanner = NetworkScanner::system();

    if args.discover_only {
        let report = discover(&scanner, range, &settings.scan).await?;
        if args.json {
            println!("{}", report::discovery_json(&report)?);
        } else {
            print!("{}", report::discovery_text(&report));
        }
    } else {
        let report = scanner.scan(&range, &settings.scan).await?;
        if args.json {
            println!("{}", report::scan_json(&report)?);
        } else {
            print!("{}", report::scan_text(&report));
        }
    }

    Ok(())
}

async fn discover(
    scanner: &NetworkScanner,
    range: HostRange,
    scan_config: &ScanConfig,
) -> Result<DiscoveryReport> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let hosts = scanner.discover_hosts(&range, scan_config).await?;

    Ok(DiscoveryReport {
        range,
        started_at,
        elapsed_ms: clock.elapsed().as_millis() as u64,
        hosts,
    })
}
