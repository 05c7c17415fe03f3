//! Scripted in-memory device for tests.
//!
//! Understands the command lines built in [`super::commands`] and answers
//! them from a map of absolute paths to file contents. Anything else can be
//! scripted with [`FakeDevice::respond`].

use super::{CommandOutput, RemoteShell, TransportError};
use crate::digest::sha256_hex;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeDevice {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
    /// Symlink path -> absolute target
    links: BTreeMap<String, String>,
    hash_denied: BTreeSet<String>,
    pull_denied: BTreeSet<String>,
    responses: HashMap<String, CommandOutput>,
    offline: AtomicBool,
    issued: Mutex<Vec<String>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let device = Self::default();
        device.dirs.lock().unwrap().insert("/".to_string());
        device
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.write_file(path, content);
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    /// Symlink at `link` pointing to `target`, as `/sdcard` does on a watch.
    pub fn with_symlink(mut self, link: &str, target: &str) -> Self {
        if let Some((parent, _)) = link.rsplit_once('/') {
            self.add_dir(if parent.is_empty() { "/" } else { parent });
        }
        self.links.insert(link.to_string(), target.to_string());
        self
    }

    /// `sha256sum` on this path fails with a permission error.
    pub fn deny_hash(mut self, path: &str) -> Self {
        self.hash_denied.insert(path.to_string());
        self
    }

    /// `adb pull` skips this file and reports an error.
    pub fn deny_pull(mut self, path: &str) -> Self {
        self.pull_denied.insert(path.to_string());
        self
    }

    pub fn respond(mut self, command: &str, output: CommandOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn write_file(&self, path: &str, content: &[u8]) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_dir(if parent.is_empty() { "/" } else { parent });
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    fn add_dir(&self, path: &str) {
        let mut dirs = self.dirs.lock().unwrap();
        let mut current = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            dirs.insert(current.clone());
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }

    /// `path` with a leading symlink component replaced by its target.
    fn resolve(&self, path: &str) -> String {
        for (link, target) in &self.links {
            if path == link {
                return target.clone();
            }
            if let Some(rest) = path.strip_prefix(link.as_str()).and_then(|r| r.strip_prefix('/')) {
                return format!("{}/{}", target.trim_end_matches('/'), rest);
            }
        }
        path.to_string()
    }

    /// Files under `dir` as seen through `shown`, which may be a link to it.
    fn files_seen_under(&self, shown: &str, dir: &str) -> Vec<(String, Vec<u8>)> {
        let base = dir.trim_end_matches('/');
        let shown = shown.trim_end_matches('/');
        self.files_under(dir)
            .into_iter()
            .map(|(path, content)| (format!("{}{}", shown, &path[base.len()..]), content))
            .collect()
    }

    fn files_under(&self, dir: &str) -> Vec<(String, Vec<u8>)> {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect()
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(
                "adb: error: no devices/emulators found".to_string(),
            ));
        }
        Ok(())
    }
}

/// First single-quoted word of a command, undoing `'\''` escapes.
pub fn first_quoted(command: &str) -> Option<String> {
    let start = command.find('\'')?;
    let mut rest = &command[start + 1..];
    let mut value = String::new();
    loop {
        let end = rest.find('\'')?;
        value.push_str(&rest[..end]);
        rest = &rest[end + 1..];
        if let Some(after) = rest.strip_prefix("\\''") {
            value.push('\'');
            rest = after;
        } else {
            return Some(value);
        }
    }
}

#[async_trait]
impl RemoteShell for FakeDevice {
    async fn shell(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.check_online()?;
        self.issued.lock().unwrap().push(command.to_string());

        if let Some(output) = self.responses.get(command) {
            return Ok(output.clone());
        }

        let path = first_quoted(command).unwrap_or_default();

        if command.starts_with("if [ -d ") {
            let resolved = self.resolve(&path);
            let kind = if self.is_dir(&resolved) {
                "dir"
            } else if self.files.lock().unwrap().contains_key(&resolved) || self.links.contains_key(&path) {
                "file"
            } else {
                "missing"
            };
            return Ok(CommandOutput::ok(format!("{}\n", kind)));
        }

        if command.starts_with("find ") {
            if self.links.contains_key(&path) && !command.starts_with("find -H ") {
                // Without -H find does not descend into a linked start point
                return Ok(CommandOutput::ok(format!("{}\n", path)));
            }
            let resolved = self.resolve(&path);
            if !self.is_dir(&resolved) {
                return Ok(CommandOutput::failed(
                    1,
                    format!("find: {}: No such file or directory\n", path),
                ));
            }
            // Reverse order so callers cannot rely on listing order
            let listing: String = self
                .files_seen_under(&path, &resolved)
                .into_iter()
                .rev()
                .map(|(p, _)| format!("{}\n", p))
                .collect();
            return Ok(CommandOutput::ok(listing));
        }

        if command.starts_with("sha256sum ") {
            let resolved = self.resolve(&path);
            if self.is_dir(&resolved) {
                return Ok(CommandOutput::failed(1, format!("sha256sum: {}: Is a directory\n", path)));
            }
            if self.hash_denied.contains(&path) {
                return Ok(CommandOutput::failed(
                    1,
                    format!("sha256sum: {}: Permission denied\n", path),
                ));
            }
            return Ok(match self.files.lock().unwrap().get(&resolved) {
                Some(content) => CommandOutput::ok(format!("{}  {}\n", sha256_hex(content), path)),
                None => CommandOutput::failed(1, format!("sha256sum: {}: No such file or directory\n", path)),
            });
        }

        if command == "ls /" {
            let dirs = self.dirs.lock().unwrap();
            let files = self.files.lock().unwrap();
            let mut names: BTreeSet<String> = BTreeSet::new();
            for path in dirs.iter().chain(files.keys()).chain(self.links.keys()) {
                if let Some(name) = path.strip_prefix('/') {
                    if !name.is_empty() && !name.contains('/') {
                        names.insert(name.to_string());
                    }
                }
            }
            let listing: String = names.into_iter().map(|n| format!("{}\n", n)).collect();
            return Ok(CommandOutput::ok(listing));
        }

        Ok(CommandOutput::failed(127, format!("/system/bin/sh: {}: inaccessible or not found\n", command)))
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<CommandOutput, TransportError> {
        self.check_online()?;
        self.issued.lock().unwrap().push(format!("pull {}", remote));

        let shown = remote;
        let resolved = self.resolve(remote);
        let remote = resolved.as_str();
        let single = self.files.lock().unwrap().get(remote).cloned();
        if let Some(content) = single {
            if self.pull_denied.contains(remote) {
                return Ok(CommandOutput::failed(
                    1,
                    format!("adb: error: failed to copy '{}': Permission denied\n", remote),
                ));
            }
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(local, content).unwrap();
            return Ok(CommandOutput::ok("1 file pulled.\n"));
        }

        if !self.is_dir(remote) {
            return Ok(CommandOutput::failed(
                1,
                format!("adb: error: failed to stat remote object '{}': No such file or directory\n", remote),
            ));
        }

        std::fs::create_dir_all(local).unwrap();
        let base = remote.trim_end_matches('/');
        let mut errors = String::new();
        let mut pulled = 0;
        for (path, content) in self.files_seen_under(shown, base) {
            if self.pull_denied.contains(&path) {
                errors.push_str(&format!("adb: error: failed to copy '{}': Permission denied\n", path));
                continue;
            }
            let rel = path[shown.trim_end_matches('/').len()..].trim_start_matches('/');
            let dest = local.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(dest, content).unwrap();
            pulled += 1;
        }

        if errors.is_empty() {
            Ok(CommandOutput::ok(format!("{} files pulled.\n", pulled)))
        } else {
            Ok(CommandOutput {
                exit_code: Some(1),
                stdout: format!("{} files pulled.\n", pulled),
                stderr: errors,
            })
        }
    }

    fn describe(&self) -> String {
        "fake device".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::commands;

    #[test]
    fn test_first_quoted_roundtrips_quote() {
        for path in ["/sdcard", "/sdcard/it's", "/a b/'c'"] {
            let command = commands::hash_file(path);
            assert_eq!(first_quoted(&command).as_deref(), Some(path));
        }
    }

    #[tokio::test]
    async fn test_path_kind_answers() {
        let device = FakeDevice::new().with_file("/etc/hosts", b"127.0.0.1 localhost\n");
        let kind = |p: &str| commands::path_kind(p);
        assert_eq!(device.shell(&kind("/etc")).await.unwrap().stdout, "dir\n");
        assert_eq!(device.shell(&kind("/etc/hosts")).await.unwrap().stdout, "file\n");
        assert_eq!(device.shell(&kind("/nope")).await.unwrap().stdout, "missing\n");
    }
}
