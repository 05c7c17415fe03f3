//! Remote shell command lines issued by the acquisition tool.
//!
//! Every path is single-quoted for the device's `sh`, so names containing
//! spaces or shell metacharacters reach the command untouched.

/// Quote `value` as one POSIX shell word.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Prints `dir`, `file` or `missing` for `path`.
///
/// Dangling symlinks count as files: they are evidence too.
pub fn path_kind(path: &str) -> String {
    let q = quote(path);
    format!(
        "if [ -d {q} ]; then echo dir; elif [ -e {q} ] || [ -L {q} ]; then echo file; else echo missing; fi"
    )
}

/// Recursive listing of regular files and symlinks under `path`.
///
/// `-H` follows `path` itself when it is a symlink (`/sdcard`, `/etc` on
/// Android) but no links found below it.
pub fn list_files(path: &str) -> String {
    format!("find -H {} \\( -type f -o -type l \\) -print", quote(path))
}

pub fn hash_file(path: &str) -> String {
    format!("sha256sum {}", quote(path))
}

pub fn list_root() -> String {
    "ls /".to_string()
}

pub fn getprop(property: &str) -> String {
    format!("getprop {}", property)
}

pub fn settings_get(namespace: &str, key: &str) -> String {
    format!("settings get {} {}", namespace, key)
}

pub fn settings_put(namespace: &str, key: &str, value: &str) -> String {
    format!("settings put {} {} {}", namespace, key, value)
}

/// `svc <service> disable` for `wifi`, `data` or `bluetooth`.
pub fn svc_disable(service: &str) -> String {
    format!("svc {} disable", service)
}

pub fn broadcast_airplane_mode() -> String {
    "am broadcast -a android.intent.action.AIRPLANE_MODE".to_string()
}

pub fn list_processes() -> String {
    "ps -A -o PID,PPID,USER,NAME".to_string()
}

pub fn list_system_packages() -> String {
    "pm list packages -s".to_string()
}

pub fn list_third_party_packages() -> String {
    "pm list packages -3".to_string()
}

pub fn pidof(package: &str) -> String {
    format!("pidof {}", quote(package))
}

pub fn force_stop(package: &str) -> String {
    format!("am force-stop {}", quote(package))
}
