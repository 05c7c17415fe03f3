//! Process analysis and suspension of third-party apps.

use super::{append_to_file, capture, AcquisitionAction, ActionContext, ActionId, ActionOutcome};
use crate::errors::{AcqError, AcqResult};
use crate::transport::commands;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: String,
    pub ppid: String,
    pub user: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessClass {
    /// Children of init, or running as root/system: native and kernel side
    Critical,
    SystemApp,
    UserApp,
    Unknown,
}

impl ProcessClass {
    pub fn title(&self) -> &'static str {
        match self {
            ProcessClass::Critical => "Critical Processes (native and kernel)",
            ProcessClass::SystemApp => "System Apps (likely legitimate)",
            ProcessClass::UserApp => "User-installed Apps",
            ProcessClass::Unknown => "Unknown Processes",
        }
    }
}

/// Parse `ps -A -o PID,PPID,USER,NAME`, sorted by parent then pid.
pub fn parse_processes(stdout: &str) -> Vec<ProcessEntry> {
    let mut entries: Vec<ProcessEntry> = stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            Some(ProcessEntry {
                pid: cols.next()?.to_string(),
                ppid: cols.next()?.to_string(),
                user: cols.next()?.to_string(),
                name: cols.next()?.to_string(),
            })
        })
        .collect();
    entries.sort_by_key(|e| {
        (
            e.ppid.parse::<u64>().unwrap_or(u64::MAX),
            e.pid.parse::<u64>().unwrap_or(u64::MAX),
        )
    });
    entries
}

/// Parse `pm list packages` output (`package:<name>` per line).
pub fn parse_packages(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn classify(
    entry: &ProcessEntry,
    system_packages: &BTreeSet<String>,
    user_packages: &BTreeSet<String>,
) -> ProcessClass {
    // App processes may carry a ":service" suffix
    let package = entry.name.split(':').next().unwrap_or(&entry.name);
    if entry.ppid == "1" || entry.ppid == "0" || entry.user == "root" || entry.user == "system" {
        ProcessClass::Critical
    } else if system_packages.contains(package) {
        ProcessClass::SystemApp
    } else if user_packages.contains(package) {
        ProcessClass::UserApp
    } else {
        ProcessClass::Unknown
    }
}

/// Fixed-width table of one process class.
pub fn render_table(class: ProcessClass, entries: &[&ProcessEntry]) -> String {
    let mut table = format!("\n{} ({}):\n", class.title(), entries.len());
    table.push_str(&format!("{:<7} {:<7} {:<12} {}\n", "PID", "PPID", "USER", "NAME"));
    table.push_str(&format!("{}\n", "-".repeat(60)));
    for e in entries {
        table.push_str(&format!("{:<7} {:<7} {:<12} {}\n", e.pid, e.ppid, e.user, e.name));
    }
    table
}

async fn packages(ctx: &ActionContext, command: &str) -> AcqResult<BTreeSet<String>> {
    match capture(ctx.shell.as_ref(), command).await? {
        Ok(text) => Ok(parse_packages(&text)),
        Err(reason) => {
            log::warn!(target: "acquisition", "{} failed: {}", command, reason);
            Ok(BTreeSet::new())
        }
    }
}

pub struct ProcessAnalysis;

#[async_trait]
impl AcquisitionAction for ProcessAnalysis {
    fn id(&self) -> ActionId {
        ActionId::ProcessAnalysis
    }

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
        let listing = match capture(ctx.shell.as_ref(), &commands::list_processes()).await? {
            Ok(text) => text,
            Err(reason) => {
                return Err(AcqError::EnumerationFailed {
                    path: "process table".to_string(),
                    message: reason,
                })
            }
        };
        let processes = parse_processes(&listing);
        let system = packages(ctx, &commands::list_system_packages()).await?;
        let user = packages(ctx, &commands::list_third_party_packages()).await?;

        let path = ctx.layout.processes_dir().join("processes.txt");
        append_to_file(
            &path,
            &format!(
                "== Process analysis ({}) == {} processes",
                chrono::Local::now().to_rfc3339(),
                processes.len()
            ),
        )?;

        let mut counts = Vec::new();
        for class in [
            ProcessClass::Critical,
            ProcessClass::SystemApp,
            ProcessClass::UserApp,
            ProcessClass::Unknown,
        ] {
            let members: Vec<&ProcessEntry> = processes
                .iter()
                .filter(|p| classify(p, &system, &user) == class)
                .collect();
            for p in &members {
                log::debug!(target: "acquisition", "{:?}: {} (PID {})", class, p.name, p.pid);
            }
            counts.push(format!("{} {:?}", members.len(), class));
            append_to_file(&path, &render_table(class, &members))?;
        }

        Ok(ActionOutcome {
            action: self.id(),
            summary: format!("{} processes: {}", processes.len(), counts.join(", ")),
            artifacts: vec![path],
        })
    }
}

pub struct SuspendProcesses;

async fn is_running(ctx: &ActionContext, package: &str) -> AcqResult<bool> {
    Ok(matches!(
        capture(ctx.shell.as_ref(), &commands::pidof(package)).await?,
        Ok(pids) if !pids.trim().is_empty()
    ))
}

#[async_trait]
impl AcquisitionAction for SuspendProcesses {
    fn id(&self) -> ActionId {
        ActionId::SuspendProcesses
    }

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
        let candidates: Vec<String> = match &ctx.suspend_packages {
            Some(list) => list.clone(),
            None => packages(ctx, &commands::list_third_party_packages())
                .await?
                .into_iter()
                .collect(),
        };
        let path = ctx.layout.processes_dir().join("suspended_processes.txt");
        append_to_file(
            &path,
            &format!("== Process suspension ({}) ==", chrono::Local::now().to_rfc3339()),
        )?;

        let mut stopped = 0;
        let mut still_running = 0;
        for package in &candidates {
            ctx.cancel.check("process suspension")?;
            if !is_running(ctx, package).await? {
                log::debug!(target: "acquisition", "Process '{}' is not running", package);
                continue;
            }
            log::info!(target: "acquisition", "Suspending '{}'", package);
            if let Err(reason) = capture(ctx.shell.as_ref(), &commands::force_stop(package)).await? {
                log::warn!(target: "acquisition", "force-stop {} failed: {}", package, reason);
            }
            let line = if is_running(ctx, package).await? {
                still_running += 1;
                log::warn!(target: "acquisition", "Process '{}' is still running after force-stop", package);
                format!("{}: still running; suspension unsuccessful", package)
            } else {
                stopped += 1;
                format!("{}: stopped", package)
            };
            append_to_file(&path, &line)?;
        }

        Ok(ActionOutcome {
            action: self.id(),
            summary: format!(
                "{} checked, {} stopped, {} still running",
                candidates.len(),
                stopped,
                still_running
            ),
            artifacts: vec![path],
        })
    }
}
