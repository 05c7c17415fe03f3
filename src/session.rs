//! Pre-acquisition: find the watch, connect to it and try to gain root.

use crate::config::{OutputLayout, Settings};
use crate::errors::{AcqError, AcqResult};
use crate::transport::{AdbDevice, AdbShell};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Port `adb connect` uses when the operator gives a bare address.
pub const DEFAULT_ADB_PORT: u16 = 5555;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// A single local emulator or USB device
    Emulated,
    /// One specific attached device, by serial
    Attached { serial: String },
    /// A watch paired over Wi-Fi at `host:port`
    Physical { address: String },
}

impl SessionMode {
    /// Physical mode for `watch`, adding the default port when missing.
    pub fn physical(watch: &str) -> AcqResult<Self> {
        let watch = watch.trim();
        if watch.is_empty() {
            return Err(AcqError::InvalidInput("watch address is empty".to_string()));
        }
        let address = match watch.rsplit_once(':') {
            Some((host, port)) => {
                port.parse::<u16>()
                    .map_err(|_| AcqError::InvalidInput(format!("invalid port in {}", watch)))?;
                format!("{}:{}", host, port)
            }
            None => format!("{}:{}", watch, DEFAULT_ADB_PORT),
        };
        Ok(SessionMode::Physical { address })
    }

    /// Host part of the watch address, for the network monitor.
    pub fn watch_ip(&self) -> Option<&str> {
        match self {
            SessionMode::Emulated | SessionMode::Attached { .. } => None,
            SessionMode::Physical { address } => address.rsplit_once(':').map(|(host, _)| host),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Emulated => write!(f, "emulated"),
            SessionMode::Attached { serial } => write!(f, "emulated ({})", serial),
            SessionMode::Physical { address } => write!(f, "physical ({})", address),
        }
    }
}

/// Pick the device to acquire from an `adb devices` listing.
pub fn select_device(devices: &[AdbDevice], mode: &SessionMode) -> AcqResult<AdbDevice> {
    match mode {
        SessionMode::Emulated => {
            let ready: Vec<&AdbDevice> = devices.iter().filter(|d| d.is_ready()).collect();
            match ready.as_slice() {
                [device] => Ok((*device).clone()),
                [] => Err(AcqError::RemoteUnreachable(
                    "no device in 'device' state".to_string(),
                )),
                many => Err(AcqError::InvalidInput(format!(
                    "{} devices attached, expected exactly one",
                    many.len()
                ))),
            }
        }
        SessionMode::Attached { serial: address } | SessionMode::Physical { address } => {
            match devices.iter().find(|d| &d.serial == address) {
                Some(device) if device.is_ready() => Ok(device.clone()),
                Some(device) => Err(AcqError::RemoteUnreachable(format!(
                    "{} is {}",
                    address, device.state
                ))),
                None => Err(AcqError::RemoteUnreachable(format!(
                    "{} not in the adb device list",
                    address
                ))),
            }
        }
    }
}

pub struct DeviceSession {
    pub shell: Arc<AdbShell>,
    pub device: AdbDevice,
    pub rooted: bool,
    pub mode: SessionMode,
}

/// Connect (physical), select the device, attempt `adb root`, and record
/// the device listing under the pre-acquisition folder.
pub async fn establish(
    settings: &Settings,
    mode: SessionMode,
    layout: &OutputLayout,
) -> AcqResult<DeviceSession> {
    let client = AdbShell::new(settings.adb_path.clone(), None, settings.command_timeout());

    if let SessionMode::Physical { address } = &mode {
        log::info!(target: "network", "Connecting to {} over adb", address);
        if !client.connect(address).await? {
            return Err(AcqError::RemoteUnreachable(format!("adb connect {} failed", address)));
        }
    }

    let devices = client.devices().await?;
    write_listing(layout, &mode, &devices)?;
    let device = select_device(&devices, &mode)?;
    log::info!(target: "acquisition", "Using device {} ({})", device.serial, mode);

    let shell = client.with_serial(device.serial.clone());
    let rooted = shell.root().await?;
    if rooted {
        log::info!(target: "acquisition", "adbd is running as root");
    } else {
        log::warn!(
            target: "acquisition",
            "Device is not rooted; protected paths will be reported as unreadable"
        );
    }

    Ok(DeviceSession {
        shell: Arc::new(shell),
        device,
        rooted,
        mode,
    })
}

fn write_listing(layout: &OutputLayout, mode: &SessionMode, devices: &[AdbDevice]) -> AcqResult<()> {
    let dir = layout.preacquisition_dir();
    std::fs::create_dir_all(&dir).map_err(|e| AcqError::io(e, dir.clone()))?;
    let path = dir.join("adb_devices.txt");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AcqError::io(e, path.clone()))?;

    let mut text = format!("== {} session ({}) ==\n", mode, chrono::Local::now().to_rfc3339());
    for device in devices {
        text.push_str(&format!("{}\t{}\n", device.serial, device.state));
    }
    if devices.is_empty() {
        text.push_str("(no devices)\n");
    }
    file.write_all(text.as_bytes())
        .map_err(|e| AcqError::io(e, path.clone()))
}
