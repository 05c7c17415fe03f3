//! Watches the examiner network while a physical watch is connected.
//!
//! Only the watch and the default gateway may be present. With enforcement
//! on, anything else trips the session's cancellation flag so the running
//! acquisition stops at its next stage boundary.

use crate::cancel::CancelFlag;
use crate::errors::{AcqError, AcqResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Most hosts allowed on the examiner network: the watch and the gateway.
pub const MAX_HOSTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub ip: String,
    pub mac: Option<String>,
    pub state: String,
}

impl Neighbor {
    /// Entries the kernel has given up on are not hosts on the network.
    pub fn is_present(&self) -> bool {
        !matches!(self.state.as_str(), "FAILED" | "INCOMPLETE")
    }
}

/// Parse `ip neigh show dev <iface>` output.
pub fn parse_neighbors(stdout: &str) -> Vec<Neighbor> {
    stdout
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let ip = tokens.first()?;
            let mac = tokens
                .iter()
                .position(|t| *t == "lladdr")
                .and_then(|i| tokens.get(i + 1))
                .map(|m| m.to_string());
            let state = tokens.last().filter(|_| tokens.len() > 1)?;
            Some(Neighbor {
                ip: ip.to_string(),
                mac,
                state: state.to_string(),
            })
        })
        .collect()
}

/// Gateway address from `ip route show default`.
pub fn parse_default_gateway(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "default" {
            return None;
        }
        tokens
            .by_ref()
            .skip_while(|t| *t != "via")
            .nth(1)
            .map(str::to_string)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorVerdict {
    Clear,
    Unauthorized(Vec<Neighbor>),
    TooManyHosts(usize),
}

/// Host count is checked first, so a crowded network reports how crowded it
/// is rather than just the strangers on it.
pub fn evaluate(neighbors: &[Neighbor], allowed: &BTreeSet<String>) -> MonitorVerdict {
    let present: Vec<&Neighbor> = neighbors.iter().filter(|n| n.is_present()).collect();
    let hosts: BTreeSet<&str> = present.iter().map(|n| n.ip.as_str()).collect();
    if hosts.len() > MAX_HOSTS {
        return MonitorVerdict::TooManyHosts(hosts.len());
    }
    let unauthorized: Vec<Neighbor> = present
        .iter()
        .filter(|n| !allowed.contains(&n.ip))
        .map(|n| (*n).clone())
        .collect();
    if !unauthorized.is_empty() {
        return MonitorVerdict::Unauthorized(unauthorized);
    }
    MonitorVerdict::Clear
}

#[async_trait]
pub trait NeighborSource: Send + Sync {
    async fn neighbors(&self) -> AcqResult<Vec<Neighbor>>;
    async fn default_gateway(&self) -> AcqResult<Option<String>>;
}

/// Reads the neighbour table with iproute2.
pub struct IpNeighborSource {
    interface: String,
}

impl IpNeighborSource {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    async fn ip(&self, args: &[&str]) -> AcqResult<String> {
        let output = Command::new("ip")
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AcqError::io(e, None))?;
        if !output.status.success() {
            return Err(AcqError::InvalidInput(format!(
                "ip {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl NeighborSource for IpNeighborSource {
    async fn neighbors(&self) -> AcqResult<Vec<Neighbor>> {
        let stdout = self
            .ip(&["neigh", "show", "dev", self.interface.as_str()])
            .await?;
        Ok(parse_neighbors(&stdout))
    }

    async fn default_gateway(&self) -> AcqResult<Option<String>> {
        Ok(parse_default_gateway(&self.ip(&["route", "show", "default"]).await?))
    }
}

pub struct NetworkMonitor {
    source: Arc<dyn NeighborSource>,
    watch_ip: String,
    interval: Duration,
    enforcement: Arc<AtomicBool>,
    cancel: CancelFlag,
}

impl NetworkMonitor {
    pub fn new(
        source: Arc<dyn NeighborSource>,
        watch_ip: impl Into<String>,
        interval: Duration,
        enforce: bool,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            source,
            watch_ip: watch_ip.into(),
            interval,
            enforcement: Arc::new(AtomicBool::new(enforce)),
            cancel,
        }
    }

    /// Shared switch for turning enforcement on and off while running.
    pub fn enforcement(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enforcement)
    }

    /// One scan of the neighbour table. Trips cancellation on a violation
    /// while enforcement is on.
    pub async fn check_once(&self) -> AcqResult<MonitorVerdict> {
        let mut allowed = BTreeSet::from([self.watch_ip.clone()]);
        if let Some(gateway) = self.source.default_gateway().await? {
            allowed.insert(gateway);
        }
        let verdict = evaluate(&self.source.neighbors().await?, &allowed);
        let enforcing = self.enforcement.load(Ordering::SeqCst);

        match &verdict {
            MonitorVerdict::Clear => {}
            MonitorVerdict::Unauthorized(hosts) if enforcing => {
                for host in hosts {
                    log::error!(
                        target: "network",
                        "Unauthorized device detected - IP: {}, MAC: {}",
                        host.ip,
                        host.mac.as_deref().unwrap_or("unknown")
                    );
                }
                self.cancel.cancel();
            }
            MonitorVerdict::TooManyHosts(count) if enforcing => {
                log::error!(
                    target: "network",
                    "{} hosts on the examiner network (at most {} allowed); aborting",
                    count,
                    MAX_HOSTS
                );
                self.cancel.cancel();
            }
            other => log::debug!(target: "network", "Enforcement off, ignoring {:?}", other),
        }
        Ok(verdict)
    }

    /// Poll until cancellation is requested or a violation trips it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!(
                target: "network",
                "Network monitor started (watch {}, every {}s)",
                self.watch_ip,
                self.interval.as_secs()
            );
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if self.cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = self.check_once().await {
                    log::warn!(target: "network", "Network check failed: {}", e);
                }
            }
            log::info!(target: "network", "Network monitor stopped");
        })
    }
}
