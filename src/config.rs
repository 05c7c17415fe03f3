//! Persistent settings and the on-disk layout of an acquisition.

use crate::errors::{AcqError, AcqResult};
use crate::selection::Selection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";
pub const LOG_FILE: &str = "iterator.log";

/// Steps run by the automatic acquisition, in their fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSteps {
    pub device_information: bool,
    pub isolate_device: bool,
    pub logical_extraction: bool,
    pub process_analysis: bool,
    pub suspend_processes: bool,
}

impl Default for AutoSteps {
    fn default() -> Self {
        Self {
            device_information: true,
            isolate_device: true,
            logical_extraction: true,
            process_analysis: true,
            suspend_processes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_adb_path")]
    pub adb_path: String,

    /// Abort when unknown hosts appear on the examiner network
    #[serde(default = "default_true")]
    pub network_enforcement: bool,

    #[serde(default)]
    pub auto_acquisition_steps: AutoSteps,

    #[serde(default = "default_selection")]
    pub default_selection: Selection,

    #[serde(default = "default_excluded_folders")]
    pub excluded_folders: Vec<String>,

    #[serde(default = "default_important_folders")]
    pub important_folders: Vec<String>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Upper bound for one pipeline stage; a large pull can take a while
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_true() -> bool {
    true
}

fn default_selection() -> Selection {
    Selection::ExceptExcluded
}

fn default_excluded_folders() -> Vec<String> {
    ["dev", "proc", "sys"].iter().map(|s| s.to_string()).collect()
}

fn default_important_folders() -> Vec<String> {
    [
        "sdcard",
        "/system/apex",
        "/etc/hosts",
        "/system/etc",
        "/system/fonts",
        "/system/framework",
        "/system/hidden",
        "/system/lib",
        "/system/media",
        "/system/priv-app",
        "/system/tts",
        "/system/usr",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_command_timeout() -> u64 {
    60
}

fn default_stage_timeout() -> u64 {
    3600
}

fn default_monitor_interval() -> u64 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            adb_path: default_adb_path(),
            network_enforcement: default_true(),
            auto_acquisition_steps: AutoSteps::default(),
            default_selection: default_selection(),
            excluded_folders: default_excluded_folders(),
            important_folders: default_important_folders(),
            command_timeout_secs: default_command_timeout(),
            stage_timeout_secs: default_stage_timeout(),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> AcqResult<Self> {
        if !path.exists() {
            log::debug!(target: "app", "No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| AcqError::io(e, path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|e| AcqError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> AcqResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AcqError::io(e, parent.to_path_buf()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| AcqError::io(e, path.to_path_buf()))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }
}

/// Numbered folders written under the output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preacquisition_dir(&self) -> PathBuf {
        self.root.join("1_preacquisition")
    }

    pub fn device_information_dir(&self) -> PathBuf {
        self.root.join("2_device_information")
    }

    pub fn isolation_dir(&self) -> PathBuf {
        self.root.join("3_isolation_status")
    }

    pub fn extraction_dir(&self) -> PathBuf {
        self.root.join("4_data_extraction")
    }

    /// Pulled targets land here, replicating their device paths
    pub fn logical_dir(&self) -> PathBuf {
        self.extraction_dir().join("logical_data_extraction")
    }

    pub fn processes_dir(&self) -> PathBuf {
        self.root.join("5_analyze_processes")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    fn sections(&self) -> [PathBuf; 5] {
        [
            self.preacquisition_dir(),
            self.device_information_dir(),
            self.isolation_dir(),
            self.extraction_dir(),
            self.processes_dir(),
        ]
    }

    pub fn create_all(&self) -> AcqResult<()> {
        for dir in self.sections() {
            fs::create_dir_all(&dir).map_err(|e| AcqError::io(e, dir.clone()))?;
        }
        Ok(())
    }

    /// Remove results of a previous run: every section folder and the log.
    ///
    /// Anything else in the output directory (a saved bundle, for one) is
    /// left alone.
    pub fn clear(&self) -> AcqResult<()> {
        for dir in self.sections() {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|e| AcqError::io(e, dir.clone()))?;
            }
        }
        let log = self.log_file();
        if log.exists() {
            fs::write(&log, b"").map_err(|e| AcqError::io(e, log.clone()))?;
        }
        Ok(())
    }
}
