use super::{append_to_file, capture, AcquisitionAction, ActionContext, ActionId, ActionOutcome};
use crate::errors::AcqResult;
use crate::transport::commands;
use async_trait::async_trait;

/// Single-line identity and build properties read through `getprop`.
const PROPERTIES: &[(&str, &str)] = &[
    ("Device Name", "ro.product.name"),
    ("Device Model", "ro.product.model"),
    ("Device Manufacturer", "ro.product.manufacturer"),
    ("Serial Number", "ro.serialno"),
    ("Device Code", "ro.product.code"),
    ("Device Chip", "ro.chipname"),
    ("Build ID", "ro.build.id"),
    ("Build Date", "ro.build.date"),
    ("Build Fingerprint", "ro.build.fingerprint"),
    ("Android Version", "ro.build.version.release"),
    ("Security Patch", "ro.build.version.security_patch"),
    ("Bootloader", "ro.boot.bootloader"),
    ("Timezone", "persist.sys.timezone"),
    ("Encryption State", "ro.crypto.state"),
];

/// Multi-line sections captured verbatim.
const SECTIONS: &[(&str, &str)] = &[
    ("Device Uptime", "uptime"),
    ("Kernel Information", "cat /proc/version"),
    ("User Privileges", "id"),
    ("Superuser Privileges", "su -c id"),
    ("Disk Partitions", "cat /proc/diskstats"),
    ("Storage Info", "df -h"),
    ("Battery Status", "dumpsys battery"),
    ("Network Interfaces", "ifconfig"),
    ("Device Users", "pm list users"),
    ("Installed Packages", "pm list packages"),
];

pub struct DeviceInformation;

#[async_trait]
impl AcquisitionAction for DeviceInformation {
    fn id(&self) -> ActionId {
        ActionId::DeviceInformation
    }

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
        let path = ctx.layout.device_information_dir().join("device_information.txt");
        let shell = ctx.shell.as_ref();
        let mut unavailable = 0;

        append_to_file(
            &path,
            &format!("== Device information ({}) ==", chrono::Local::now().to_rfc3339()),
        )?;

        for (label, property) in PROPERTIES {
            log::debug!(target: "acquisition", "Retrieving: {}", label);
            let line = match capture(shell, &commands::getprop(property)).await? {
                Ok(value) => format!("{}: {}", label, value.trim()),
                Err(reason) => {
                    unavailable += 1;
                    log::warn!(target: "acquisition", "Could not retrieve {}: {}", label, reason);
                    format!("{}: unavailable ({})", label, reason)
                }
            };
            append_to_file(&path, &line)?;
        }

        for (label, command) in SECTIONS {
            ctx.cancel.check("device information")?;
            log::debug!(target: "acquisition", "Retrieving: {}", label);
            let body = match capture(shell, command).await? {
                Ok(text) => text,
                Err(reason) => {
                    unavailable += 1;
                    log::warn!(target: "acquisition", "Could not retrieve {}: {}", label, reason);
                    format!("unavailable ({})", reason)
                }
            };
            append_to_file(&path, &format!("\n{}:\n{}", label, body))?;
        }

        let total = PROPERTIES.len() + SECTIONS.len();
        Ok(ActionOutcome {
            action: self.id(),
            summary: format!("{} of {} items collected", total - unavailable, total),
            artifacts: vec![path],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::context;
    use crate::transport::fake::FakeDevice;
    use crate::transport::CommandOutput;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_properties_and_notes_failures() {
        let tmp = TempDir::new().unwrap();
        let device = FakeDevice::new()
            .respond(&commands::getprop("ro.product.model"), CommandOutput::ok("SM-R890\n"))
            .respond(&commands::getprop("ro.serialno"), CommandOutput::ok("R9ATB0XXXXX\n"))
            .respond("su -c id", CommandOutput::failed(1, "/system/bin/sh: su: not found\n"));
        let (ctx, _device) = context(device, tmp.path());

        let outcome = DeviceInformation.run(&ctx).await.unwrap();
        let text = std::fs::read_to_string(&outcome.artifacts[0]).unwrap();
        assert!(text.contains("Device Model: SM-R890"));
        assert!(text.contains("Serial Number: R9ATB0XXXXX"));
        assert!(text.contains("Superuser Privileges:\nunavailable (/system/bin/sh: su: not found)"));
        assert!(outcome.summary.starts_with("2 of 24"));
    }
}
