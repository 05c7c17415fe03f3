//! Acquisition actions offered by the console.
//!
//! Each menu entry is an [`ActionId`] mapped to an [`AcquisitionAction`]
//! implementation. All actions share one [`ActionContext`].

pub mod device_info;
pub mod extraction;
pub mod isolation;
pub mod processes;

use crate::cancel::CancelFlag;
use crate::config::{AutoSteps, OutputLayout, Settings};
use crate::errors::{AcqError, AcqResult};
use crate::selection::Selection;
use crate::transport::{CommandOutput, RemoteShell, TransportError};
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionId {
    DeviceInformation,
    IsolateDevice,
    LogicalExtraction,
    ProcessAnalysis,
    SuspendProcesses,
}

impl ActionId {
    /// Every action, in the order the automatic acquisition runs them.
    pub const ALL: [ActionId; 5] = [
        ActionId::DeviceInformation,
        ActionId::IsolateDevice,
        ActionId::LogicalExtraction,
        ActionId::ProcessAnalysis,
        ActionId::SuspendProcesses,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ActionId::DeviceInformation => "Collect device information",
            ActionId::IsolateDevice => "Isolate device from networks",
            ActionId::LogicalExtraction => "Logical data extraction",
            ActionId::ProcessAnalysis => "Analyze running processes",
            ActionId::SuspendProcesses => "Suspend third-party processes",
        }
    }

    pub fn is_enabled(&self, steps: &AutoSteps) -> bool {
        match self {
            ActionId::DeviceInformation => steps.device_information,
            ActionId::IsolateDevice => steps.isolate_device,
            ActionId::LogicalExtraction => steps.logical_extraction,
            ActionId::ProcessAnalysis => steps.process_analysis,
            ActionId::SuspendProcesses => steps.suspend_processes,
        }
    }

    fn stage_name(&self) -> &'static str {
        match self {
            ActionId::DeviceInformation => "device information",
            ActionId::IsolateDevice => "isolation",
            ActionId::LogicalExtraction => "logical extraction",
            ActionId::ProcessAnalysis => "process analysis",
            ActionId::SuspendProcesses => "process suspension",
        }
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Everything an action needs; built once per session.
pub struct ActionContext {
    pub shell: Arc<dyn RemoteShell>,
    pub settings: Settings,
    pub layout: OutputLayout,
    pub cancel: CancelFlag,
    pub selection: Selection,
    /// Targets given on the command line; bypass selection when non-empty
    pub explicit_targets: Vec<String>,
    /// Packages to suspend; `None` means every running third-party package
    pub suspend_packages: Option<Vec<String>>,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub action: ActionId,
    pub summary: String,
    pub artifacts: Vec<PathBuf>,
}

#[async_trait]
pub trait AcquisitionAction: Send + Sync {
    fn id(&self) -> ActionId;

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome>;
}

pub fn action_for(id: ActionId) -> Box<dyn AcquisitionAction> {
    match id {
        ActionId::DeviceInformation => Box::new(device_info::DeviceInformation),
        ActionId::IsolateDevice => Box::new(isolation::IsolateDevice),
        ActionId::LogicalExtraction => Box::new(extraction::LogicalExtraction),
        ActionId::ProcessAnalysis => Box::new(processes::ProcessAnalysis),
        ActionId::SuspendProcesses => Box::new(processes::SuspendProcesses),
    }
}

/// Run one action with start and outcome logging.
pub async fn run_action(id: ActionId, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
    ctx.cancel.check(id.stage_name())?;
    log::info!(target: "acquisition", "Starting: {}", id.title());
    let result = action_for(id).run(ctx).await;
    match &result {
        Ok(outcome) => log::info!(target: "acquisition", "Finished: {} ({})", id.title(), outcome.summary),
        Err(e) => log::error!(target: "acquisition", "{} failed: {}", id.title(), e),
    }
    result
}

/// Run the enabled steps in their fixed order.
///
/// A failing step is recorded and the next one runs, unless the failure
/// leaves the device unusable or cancellation was requested.
pub async fn run_auto(ctx: &ActionContext) -> Vec<(ActionId, AcqResult<ActionOutcome>)> {
    let mut results = Vec::new();
    for id in ActionId::ALL {
        if !id.is_enabled(&ctx.settings.auto_acquisition_steps) {
            log::debug!(target: "acquisition", "Auto acquisition skips: {}", id.title());
            continue;
        }
        let result = run_action(id, ctx).await;
        let stop = matches!(&result, Err(e) if e.is_run_fatal());
        results.push((id, result));
        if stop {
            log::error!(target: "acquisition", "Auto acquisition stopped after: {}", id.title());
            break;
        }
    }
    results
}

/// Run a device command for a report section.
///
/// Command failures and timeouts are returned as text for the report; only
/// losing the device is an error.
pub(crate) async fn capture(shell: &dyn RemoteShell, command: &str) -> AcqResult<Result<String, String>> {
    match shell.shell(command).await {
        Ok(output) if output.success() => Ok(Ok(output.stdout.trim_end().to_string())),
        Ok(output) => Ok(Err(describe_failure(&output))),
        Err(TransportError::Timeout { timeout, .. }) => {
            Ok(Err(format!("timed out after {}s", timeout.as_secs())))
        }
        Err(err) => Err(err.into()),
    }
}

fn describe_failure(output: &CommandOutput) -> String {
    if output.stdout.trim().is_empty() {
        output.failure_reason()
    } else {
        format!("{} ({})", output.stdout.trim(), output.failure_reason())
    }
}

/// Append `text` and a newline to a report file, creating it if needed.
pub(crate) fn append_to_file(path: &Path, text: &str) -> AcqResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AcqError::io(e, parent.to_path_buf()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AcqError::io(e, path.to_path_buf()))?;
    writeln!(file, "{}", text).map_err(|e| AcqError::io(e, path.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::transport::fake::FakeDevice;
    use std::path::Path;

    pub fn context(device: FakeDevice, root: &Path) -> (ActionContext, Arc<FakeDevice>) {
        let device = Arc::new(device);
        let ctx = ActionContext {
            shell: device.clone(),
            settings: Settings::default(),
            layout: OutputLayout::new(root),
            cancel: CancelFlag::new(),
            selection: Selection::ExceptExcluded,
            explicit_targets: Vec::new(),
            suspend_packages: None,
            show_progress: false,
        };
        (ctx, device)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::transport::fake::FakeDevice;
    use tempfile::TempDir;

    #[test]
    fn test_every_id_maps_to_its_action() {
        for id in ActionId::ALL {
            assert_eq!(action_for(id).id(), id);
        }
    }

    #[test]
    fn test_default_auto_steps() {
        let steps = AutoSteps::default();
        let enabled: Vec<ActionId> = ActionId::ALL
            .into_iter()
            .filter(|id| id.is_enabled(&steps))
            .collect();
        assert_eq!(enabled.len(), 4);
        assert!(!enabled.contains(&ActionId::SuspendProcesses));
    }

    #[tokio::test]
    async fn test_capture_reports_failures_as_text() {
        let device = FakeDevice::new().respond("uptime", CommandOutput::ok(" 10:00:00 up 2 days\n"));
        let ok = capture(&device, "uptime").await.unwrap();
        assert_eq!(ok.unwrap(), " 10:00:00 up 2 days");

        let missing = capture(&device, "nosuchcmd").await.unwrap();
        assert!(missing.unwrap_err().contains("not found"));

        device.set_offline(true);
        assert!(capture(&device, "uptime").await.is_err());
    }

    #[tokio::test]
    async fn test_auto_stops_when_cancelled() {
        let tmp = TempDir::new().unwrap();
        let (ctx, device) = context(FakeDevice::new(), tmp.path());
        ctx.cancel.cancel();

        let results = run_auto(&ctx).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, ActionId::DeviceInformation);
        assert!(matches!(results[0].1, Err(AcqError::Cancelled(_))));
        assert!(device.issued().is_empty());
    }

    #[tokio::test]
    async fn test_auto_stops_when_device_is_lost() {
        let tmp = TempDir::new().unwrap();
        let (ctx, device) = context(FakeDevice::new(), tmp.path());
        device.set_offline(true);

        let results = run_auto(&ctx).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, Err(AcqError::RemoteUnreachable(_))));
    }

    #[test]
    fn test_append_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2_device_information").join("device_information.txt");
        append_to_file(&path, "Device Model: SM-R890").unwrap();
        append_to_file(&path, "Serial Number: R9AT").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Device Model: SM-R890\nSerial Number: R9AT\n"
        );
    }
}
