use crate::actions::ActionId;
use crate::compress::BundleFormat;
use crate::config::{Settings, SETTINGS_FILE};
use crate::selection::Selection;
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "iterator",
    about = "ITeratOr - hash-verified logical acquisition for WearOS smartwatches over ADB",
    version
)]
#[command(group(ArgGroup::new("mode").required(true).args(["physical", "emulated"])))]
pub struct Args {
    /// Acquire a physical watch paired over Wi-Fi (requires --watch)
    #[arg(long, requires = "watch")]
    pub physical: bool,

    /// Acquire the single local emulator or USB device
    #[arg(long)]
    pub emulated: bool,

    /// Watch address as ip or ip:port
    #[arg(long)]
    pub watch: Option<String>,

    /// Serial of the attached device to use when several are listed
    #[arg(long, conflicts_with = "physical")]
    pub serial: Option<String>,

    /// Examiner network interface used by the network monitor
    #[arg(long, default_value = "wlan0")]
    pub interface: String,

    /// Settings file
    #[arg(long, default_value = SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Output directory (overrides the settings file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run one action, or `auto` for the enabled automatic steps
    #[arg(short, long)]
    pub action: Option<ActionArg>,

    /// Target selection for logical extraction (overrides the settings file)
    #[arg(long)]
    pub selection: Option<Selection>,

    /// Explicit device paths to extract; bypasses selection
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    /// Packages to suspend instead of every running third-party app
    #[arg(long, value_delimiter = ',')]
    pub suspend: Vec<String>,

    /// Bundle the output folder after the actions finish
    #[arg(long)]
    pub compress: Option<BundleFormat>,

    /// Case name used in the bundle file name
    #[arg(long, default_value = "case")]
    pub case_name: String,

    /// Case number used in the bundle file name
    #[arg(long)]
    pub case_number: Option<String>,

    /// Disable unauthorized-device enforcement on the examiner network
    #[arg(long)]
    pub no_enforcement: bool,

    /// Clear the log file and section folders before starting
    #[arg(long)]
    pub clear_logs: bool,

    /// Enable verbose logging of all operations
    #[arg(short, long)]
    pub verbose: bool,

    /// Hide progress bars and only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not ask for confirmation before clearing logs
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Auto,
    DeviceInformation,
    IsolateDevice,
    LogicalExtraction,
    ProcessAnalysis,
    SuspendProcesses,
}

impl ActionArg {
    /// The single action this selects; `None` for the automatic sequence.
    pub fn action(&self) -> Option<ActionId> {
        match self {
            ActionArg::Auto => None,
            ActionArg::DeviceInformation => Some(ActionId::DeviceInformation),
            ActionArg::IsolateDevice => Some(ActionId::IsolateDevice),
            ActionArg::LogicalExtraction => Some(ActionId::LogicalExtraction),
            ActionArg::ProcessAnalysis => Some(ActionId::ProcessAnalysis),
            ActionArg::SuspendProcesses => Some(ActionId::SuspendProcesses),
        }
    }
}

impl Args {
    /// Apply command-line overrides to the loaded settings for this run.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(output) = &self.output {
            settings.output_dir = output.clone();
        }
        if let Some(selection) = self.selection {
            settings.default_selection = selection;
        }
        if self.no_enforcement {
            settings.network_enforcement = false;
        }
    }

    pub fn suspend_packages(&self) -> Option<Vec<String>> {
        if self.suspend.is_empty() {
            None
        } else {
            Some(self.suspend.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_mode_is_required_and_exclusive() {
        assert!(Args::try_parse_from(["iterator"]).is_err());
        assert!(Args::try_parse_from(["iterator", "--emulated", "--physical", "--watch", "10.0.0.2"]).is_err());
        assert!(Args::try_parse_from(["iterator", "--physical"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "iterator",
            "--emulated",
            "--output",
            "/cases/7",
            "--selection",
            "important",
            "--action",
            "logical-extraction",
            "--target",
            "/sdcard",
            "--target",
            "/etc/hosts",
            "--suspend",
            "com.a,com.b",
            "--no-enforcement",
        ])
        .unwrap();
        assert_eq!(args.action.and_then(|a| a.action()), Some(ActionId::LogicalExtraction));
        assert_eq!(args.targets, vec!["/sdcard", "/etc/hosts"]);
        assert_eq!(args.suspend_packages(), Some(vec!["com.a".to_string(), "com.b".to_string()]));

        let mut settings = Settings::default();
        args.apply_to(&mut settings);
        assert_eq!(settings.output_dir, PathBuf::from("/cases/7"));
        assert_eq!(settings.default_selection, Selection::Important);
        assert!(!settings.network_enforcement);
    }

    #[test]
    fn test_compress_format_values() {
        let args = Args::try_parse_from(["iterator", "--emulated", "--compress", "tar-gz"]).unwrap();
        assert_eq!(args.compress, Some(BundleFormat::TarGz));
        assert_eq!(args.action, None);
    }
}
