use super::{append_to_file, capture, AcquisitionAction, ActionContext, ActionId, ActionOutcome};
use crate::errors::AcqResult;
use crate::transport::commands;
use async_trait::async_trait;

/// One radio or service to switch off, and how to read its state back.
struct Isolation {
    label: &'static str,
    namespace: &'static str,
    key: &'static str,
    apply: fn() -> Vec<String>,
}

const ISOLATIONS: &[Isolation] = &[
    Isolation {
        label: "Airplane Mode",
        namespace: "global",
        key: "airplane_mode_on",
        apply: enable_airplane_mode,
    },
    Isolation {
        label: "Mobile Data",
        namespace: "global",
        key: "mobile_data",
        apply: disable_data,
    },
    Isolation {
        label: "Bluetooth",
        namespace: "global",
        key: "bluetooth_on",
        apply: disable_bluetooth,
    },
    Isolation {
        label: "WiFi",
        namespace: "global",
        key: "wifi_on",
        apply: disable_wifi,
    },
    Isolation {
        label: "Location Services",
        namespace: "secure",
        key: "location_mode",
        apply: disable_location,
    },
];

fn enable_airplane_mode() -> Vec<String> {
    vec![
        commands::settings_put("global", "airplane_mode_on", "1"),
        commands::broadcast_airplane_mode(),
    ]
}

fn disable_data() -> Vec<String> {
    vec![commands::svc_disable("data")]
}

fn disable_bluetooth() -> Vec<String> {
    vec![commands::svc_disable("bluetooth")]
}

fn disable_wifi() -> Vec<String> {
    vec![commands::svc_disable("wifi")]
}

fn disable_location() -> Vec<String> {
    vec![commands::settings_put("secure", "location_mode", "0")]
}

/// Human reading of a raw `settings get` value.
pub fn describe_state(key: &str, raw: &str) -> String {
    let value = raw.trim();
    let meaning = match (key, value) {
        (_, "null") | (_, "") => "not set",
        ("bluetooth_on", "2") => "unavailable",
        ("airplane_mode_on", "1") => "on",
        ("location_mode", v) if v != "0" => "on",
        (_, "0") => "off",
        (_, "1") => "on",
        _ => "unknown",
    };
    format!("{} ({})", value, meaning)
}

pub struct IsolateDevice;

#[async_trait]
impl AcquisitionAction for IsolateDevice {
    fn id(&self) -> ActionId {
        ActionId::IsolateDevice
    }

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
        let path = ctx.layout.isolation_dir().join("isolation_status.txt");
        let shell = ctx.shell.as_ref();
        let mut applied = 0;

        append_to_file(
            &path,
            &format!("== Isolation ({}) ==", chrono::Local::now().to_rfc3339()),
        )?;

        for item in ISOLATIONS {
            ctx.cancel.check("isolation")?;
            let read = commands::settings_get(item.namespace, item.key);

            let before = match capture(shell, &read).await? {
                Ok(value) => describe_state(item.key, &value),
                Err(reason) => format!("unknown ({})", reason),
            };

            let mut errors = Vec::new();
            for command in (item.apply)() {
                if let Err(reason) = capture(shell, &command).await? {
                    errors.push(reason);
                }
            }

            let after = match capture(shell, &read).await? {
                Ok(value) => describe_state(item.key, &value),
                Err(reason) => format!("unknown ({})", reason),
            };

            if errors.is_empty() {
                applied += 1;
                log::info!(target: "acquisition", "{} disabled (before {}, after {})", item.label, before, after);
            } else {
                log::warn!(target: "acquisition", "Could not isolate {}: {}", item.label, errors.join("; "));
            }

            let mut line = format!("{}: before {} -> after {}", item.label, before, after);
            if !errors.is_empty() {
                line.push_str(&format!(" [failed: {}]", errors.join("; ")));
            }
            append_to_file(&path, &line)?;
        }

        Ok(ActionOutcome {
            action: self.id(),
            summary: format!("{} of {} isolation steps applied", applied, ISOLATIONS.len()),
            artifacts: vec![path],
        })
    }
}
