use super::{CommandOutput, RemoteShell, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Error messages meaning the device, not the command, is the problem.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "no devices/emulators found",
    "no devices found",
    "device offline",
    "device unauthorized",
    "device still authorizing",
    "cannot connect to daemon",
    "daemon not running",
    "closed",
];

/// Prefixes adb puts in front of its own errors.
const ADB_ERROR_PREFIXES: &[&str] = &["adb: error:", "error:"];

/// One line of `adb devices` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdbDevice {
    pub serial: String,
    pub state: String,
}

impl AdbDevice {
    pub fn is_ready(&self) -> bool {
        self.state == "device"
    }
}

/// Parse `adb devices` output, skipping the banner and daemon chatter.
pub fn parse_devices(output: &str) -> Vec<AdbDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(AdbDevice {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Whether adb's stderr says the device itself is unavailable.
///
/// Only adb's own error lines count; stderr relayed from the remote
/// command (`sha256sum: ...`, file names in copy errors) never does.
pub fn is_device_unavailable(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        let lowered = line.trim().to_lowercase();
        let Some(message) = ADB_ERROR_PREFIXES
            .iter()
            .find_map(|prefix| lowered.strip_prefix(prefix))
            .map(str::trim)
        else {
            return false;
        };
        UNAVAILABLE_MARKERS.iter().any(|marker| message.starts_with(marker))
            || (message.starts_with("device '") && message.ends_with("' not found"))
    })
}

/// Transport over the `adb` command-line client.
///
/// Commands are serialised behind an async mutex; each shell command is
/// bounded by `command_timeout` and its child process is killed if the
/// future is dropped. Pulls carry no transport timeout of their own, the
/// pipeline's stage timeout bounds them.
pub struct AdbShell {
    program: String,
    serial: Option<String>,
    command_timeout: Duration,
    lock: Mutex<()>,
}

impl AdbShell {
    pub fn new(program: impl Into<String>, serial: Option<String>, command_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            serial,
            command_timeout,
            lock: Mutex::new(()),
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Same client, pinned to a specific device serial.
    pub fn with_serial(self, serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            ..self
        }
    }

    fn command(&self, targeted: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        if targeted {
            if let Some(serial) = &self.serial {
                cmd.arg("-s").arg(serial);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        args: &[&str],
        targeted: bool,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, TransportError> {
        let _guard = self.lock.lock().await;
        let display = format!("{} {}", self.program, args.join(" "));
        log::debug!(target: "acquisition", "Running: {}", display);

        let mut cmd = self.command(targeted);
        cmd.args(args);
        let pending = cmd.output();

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!(target: "acquisition", "Command timed out after {}s: {}", limit.as_secs(), display);
                    return Err(TransportError::Timeout {
                        command: display,
                        timeout: limit,
                    });
                }
            },
            None => pending.await,
        };

        let output: CommandOutput = result
            .map_err(|e| TransportError::Unreachable(format!("failed to run {}: {}", self.program, e)))?
            .into();

        if !output.success() && is_device_unavailable(&output.stderr) {
            return Err(TransportError::Unreachable(output.failure_reason()));
        }

        Ok(output)
    }

    /// `adb devices`, across all attached devices.
    pub async fn devices(&self) -> Result<Vec<AdbDevice>, TransportError> {
        let output = self.run(&["devices"], false, Some(self.command_timeout)).await?;
        if !output.success() {
            return Err(TransportError::Unreachable(output.failure_reason()));
        }
        Ok(parse_devices(&output.stdout))
    }

    /// `adb connect host:port` for a watch paired over Wi-Fi.
    pub async fn connect(&self, address: &str) -> Result<bool, TransportError> {
        let output = self.run(&["connect", address], false, Some(self.command_timeout)).await?;
        let text = output.stdout.to_lowercase();
        Ok(output.success() && (text.contains("connected to") || text.contains("already connected")))
    }

    /// Ask adbd to restart as root. Returns whether it now runs as root.
    pub async fn root(&self) -> Result<bool, TransportError> {
        let output = self.run(&["root"], true, Some(self.command_timeout)).await?;
        let text = format!("{}{}", output.stdout, output.stderr).to_lowercase();
        if text.contains("cannot run as root") || !output.success() {
            return Ok(false);
        }
        if text.contains("restarting adbd as root") {
            // adbd drops the connection while it restarts
            let _ = self
                .run(&["wait-for-device"], true, Some(self.command_timeout))
                .await?;
        }
        Ok(text.contains("as root"))
    }
}

#[async_trait]
impl RemoteShell for AdbShell {
    async fn shell(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.run(&["shell", command], true, Some(self.command_timeout)).await
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<CommandOutput, TransportError> {
        let local = local.to_string_lossy();
        self.run(&["pull", remote, local.as_ref()], true, None).await
    }

    fn describe(&self) -> String {
        match &self.serial {
            Some(serial) => format!("adb device {}", serial),
            None => "default adb device".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
emulator-5554\tdevice
192.168.1.42:5555\tunauthorized

";
        let devices = parse_devices(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert!(devices[0].is_ready());
        assert_eq!(devices[1].state, "unauthorized");
        assert!(!devices[1].is_ready());
    }

    #[test]
    fn test_parse_devices_empty() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn test_unavailable_markers() {
        assert!(is_device_unavailable("adb: error: no devices/emulators found"));
        assert!(is_device_unavailable("error: device '192.168.1.9:5555' not found"));
        assert!(is_device_unavailable("adb: error: device offline"));
        assert!(is_device_unavailable("* daemon started successfully\nerror: closed\n"));
        assert!(!is_device_unavailable("sha256sum: /data/misc: Permission denied"));
        assert!(!is_device_unavailable(""));
    }

    #[test]
    fn test_remote_errors_naming_markers_are_not_unavailable() {
        assert!(!is_device_unavailable(
            "sha256sum: /sdcard/Movies/closed_captions.srt: I/O error"
        ));
        assert!(!is_device_unavailable(
            "adb: error: failed to copy '/sdcard/closed.txt' to './sdcard/closed.txt': remote Permission denied"
        ));
        assert!(!is_device_unavailable(
            "find: /data/device offline notes: Permission denied"
        ));
        assert!(!is_device_unavailable(
            "adb: error: failed to stat remote object '/sdcard/device 'x' not found': No such file or directory"
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unreachable() {
        let shell = AdbShell::new(
            "/nonexistent/iterator-test/adb",
            Some("emulator-5554".into()),
            Duration::from_secs(5),
        );
        let err = shell.shell("echo hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
        assert_eq!(shell.describe(), "adb device emulator-5554");
    }
}
