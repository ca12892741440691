//! ICMP echo via the system `ping` binary

use anyhow::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

/// Extra time granted to the `ping` process beyond its own reply timeout
const PROCESS_GRACE: Duration = Duration::from_millis(500);

/// Something that can send one ICMP echo and report whether it was answered
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, addr: Ipv4Addr, timeout: Duration) -> Result<bool>;
}

/// Command-line dialect of the local `ping` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// iputils / busybox: `-W` in whole seconds
    Linux,
    /// macOS and the BSDs: `-W` in milliseconds
    Bsd,
    /// `ping.exe`: `-n` count, `-w` in milliseconds
    Windows,
}

impl PingFlavor {
    /// Dialect of the platform we were built for
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            Self::Bsd
        } else {
            Self::Linux
        }
    }

    /// Arguments for a single echo request
    pub fn args(self, addr: Ipv4Addr, timeout: Duration) -> Vec<String> {
        let millis = timeout.as_millis().max(1);
        match self {
            Self::Windows => vec![
                "-n".into(),
                "1".into(),
                "-w".into(),
                millis.to_string(),
                addr.to_string(),
            ],
            Self::Bsd => vec![
                "-c".into(),
                "1".into(),
                "-W".into(),
                millis.to_string(),
                addr.to_string(),
            ],
            Self::Linux => {
                let secs = millis.div_ceil(1000);
                vec![
                    "-c".into(),
                    "1".into(),
                    "-W".into(),
                    secs.to_string(),
                    addr.to_string(),
                ]
            }
        }
    }
}

/// Pinger that shells out to the platform `ping` binary
#[derive(Debug, Clone)]
pub struct SystemPinger {
    flavor: PingFlavor,
}

impl SystemPinger {
    pub fn new() -> Self {
        Self {
            flavor: PingFlavor::current(),
        }
    }
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, addr: Ipv4Addr, limit: Duration) -> Result<bool> {
        let status = Command::new("ping")
            .args(self.flavor.args(addr, limit))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(limit + PROCESS_GRACE, status).await {
            Ok(status) => {
                let replied = status?.success();
                trace!(ip = %addr, replied, "Ping finished");
                Ok(replied)
            }
            Err(_) => {
                trace!(ip = %addr, "Ping process exceeded its deadline");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);

    #[test]
    fn test_linux_args_round_up_to_seconds() {
        let args = PingFlavor::Linux.args(TARGET, Duration::from_millis(1000));
        assert_eq!(args, vec!["-c", "1", "-W", "1", "192.168.1.100"]);

        let args = PingFlavor::Linux.args(TARGET, Duration::from_millis(250));
        assert_eq!(args[3], "1");

        let args = PingFlavor::Linux.args(TARGET, Duration::from_millis(2500));
        assert_eq!(args[3], "3");
    }

    #[test]
    fn test_bsd_args_in_millis() {
        let args = PingFlavor::Bsd.args(TARGET, Duration::from_millis(750));
        assert_eq!(args, vec!["-c", "1", "-W", "750", "192.168.1.100"]);
    }

    #[test]
    fn test_windows_args() {
        let args = PingFlavor::Windows.args(TARGET, Duration::from_millis(1000));
        assert_eq!(args, vec!["-n", "1", "-w", "1000", "192.168.1.100"]);
    }

    #[test]
    fn test_zero_timeout_still_waits() {
        let args = PingFlavor::Linux.args(TARGET, Duration::ZERO);
        assert_eq!(args[3], "1");
    }

    #[tokio::test]
    #[ignore]
    async fn test_ping_loopback() {
        let replied = SystemPinger::new()
            .ping(Ipv4Addr::LOCALHOST, Duration::from_millis(1000))
            .await
            .unwrap();
        assert!(replied);
    }
}
