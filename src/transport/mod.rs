//! Remote-command transport.
//!
//! The pipeline only ever needs two things from the device: run a shell
//! command and read its output, and bulk-copy a path off the device.
//! [`AdbShell`] provides both through the `adb` binary; tests use a scripted
//! in-memory device.

pub mod adb;
pub mod commands;
#[cfg(test)]
pub mod fake;

use crate::errors::AcqError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub use adb::{AdbDevice, AdbShell};

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best single-line explanation of a failure, for logs and reports.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.lines().next().unwrap_or(stderr).to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport itself is down (no device, unauthorized, adb missing)
    #[error("transport unavailable: {0}")]
    Unreachable(String),

    #[error("command timed out after {}s: {command}", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

impl From<TransportError> for AcqError {
    fn from(err: TransportError) -> Self {
        AcqError::RemoteUnreachable(err.to_string())
    }
}

/// A channel capable of running commands against the remote device.
///
/// Implementations must serialise their commands: only one remote command
/// is in flight at a time.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` through the device shell.
    async fn shell(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Copy `remote` (file or directory) to `local` in one invocation.
    async fn pull(&self, remote: &str, local: &Path) -> Result<CommandOutput, TransportError>;

    /// Human-readable identity of the device behind this transport.
    fn describe(&self) -> String;
}
