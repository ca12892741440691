//! Plain-text and JSON rendering of scan results

use anyhow::Result;
use chrono::{DateTime, Utc};
use lanscan_core::{DiscoveredHost, HostRange, ScanReport};
use serde::Serialize;
use std::fmt::Write;

/// Result of a discovery-only run
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub range: HostRange,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub hosts: Vec<DiscoveredHost>,
}

pub fn scan_json(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn discovery_json(report: &DiscoveryReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn scan_text(report: &ScanReport) -> String {
    let mut out = header(&report.range, report.elapsed_ms);
    let _ = writeln!(
        out,
        "{} hosts alive, {} open ports",
        report.hosts.len(),
        report.open_port_count()
    );

    if !report.hosts.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "{:<16} {:<10} OPEN PORTS", "ADDRESS", "METHOD");
        for host in &report.hosts {
            let ports = if host.open_ports.is_empty() {
                "-".to_string()
            } else {
                host.open_ports
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "{:<16} {:<10} {}",
                host.address.to_string(),
                host.method.to_string(),
                ports
            );
        }
    }
    out
}

pub fn discovery_text(report: &DiscoveryReport) -> String {
    let mut out = header(&report.range, report.elapsed_ms);
    let _ = writeln!(out, "{} hosts alive", report.hosts.len());

    if !report.hosts.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "{:<16} METHOD", "ADDRESS");
        for host in &report.hosts {
            let _ = writeln!(out, "{:<16} {}", host.address.to_string(), host.method);
        }
    }
    out
}

fn header(range: &HostRange, elapsed_ms: u64) -> String {
    format!(
        "Scanned {} ({} addresses) in {:.1} s\n",
        range,
        range.len(),
        elapsed_ms as f64 / 1000.0
    )
}
