use crate::digest::combine_digests;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Directory,
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKind::File => write!(f, "file"),
            PathKind::Directory => write!(f, "directory"),
        }
    }
}

/// One extraction target on the device, with its kind as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePath {
    raw_path: String,
    kind: PathKind,
}

impl RemotePath {
    pub fn new(raw_path: impl Into<String>, kind: PathKind) -> Self {
        Self {
            raw_path: raw_path.into(),
            kind,
        }
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == PathKind::Directory
    }

    /// Last path component, used as the key of a single-file target.
    pub fn file_name(&self) -> &str {
        self.raw_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("root")
    }

    /// Key of a remote file inside this target's digest set.
    pub fn relative_path_of(&self, remote_file: &str) -> String {
        match self.kind {
            PathKind::File => self.file_name().to_string(),
            PathKind::Directory => {
                let base = self.raw_path.trim_end_matches('/');
                let stripped = remote_file
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('/'));
                match stripped {
                    Some(rel) if !rel.is_empty() => rel.to_string(),
                    _ => remote_file.trim_start_matches('/').to_string(),
                }
            }
        }
    }

    /// Where the target lands beneath a local destination root.
    ///
    /// `/sdcard/DCIM` maps to `sdcard/DCIM`, so the device hierarchy is
    /// replicated under the destination.
    pub fn local_relative(&self) -> PathBuf {
        let components: PathBuf = self
            .raw_path
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();
        if components.as_os_str().is_empty() {
            PathBuf::from("root")
        } else {
            components
        }
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.raw_path, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Remote,
    Local,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Remote => write!(f, "remote"),
            Side::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub relative_path: String,
    pub hex_digest: String,
}

impl FileDigest {
    pub fn new(relative_path: impl Into<String>, hex_digest: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            hex_digest: hex_digest.into(),
        }
    }
}

/// Digests gathered on one side of a transfer.
///
/// Entries are keyed by relative path and iterate in lexicographic order,
/// which is the order the directory digest is combined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSet {
    side: Side,
    kind: PathKind,
    entries: BTreeMap<String, FileDigest>,
    failures: BTreeMap<String, String>,
}

impl DigestSet {
    pub fn new(side: Side, kind: PathKind) -> Self {
        Self {
            side,
            kind,
            entries: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    /// Add a digest. Returns false and keeps the existing entry when the
    /// relative path was already recorded.
    pub fn insert(&mut self, digest: FileDigest) -> bool {
        if self.entries.contains_key(&digest.relative_path) {
            return false;
        }
        self.failures.remove(&digest.relative_path);
        self.entries.insert(digest.relative_path.clone(), digest);
        true
    }

    /// Record that a file was seen but could not be hashed.
    pub fn record_failure(&mut self, relative_path: impl Into<String>, reason: impl Into<String>) {
        let relative_path = relative_path.into();
        if !self.entries.contains_key(&relative_path) {
            self.failures.insert(relative_path, reason.into());
        }
    }

    pub fn get(&self, relative_path: &str) -> Option<&FileDigest> {
        self.entries.get(relative_path)
    }

    pub fn failure(&self, relative_path: &str) -> Option<&str> {
        self.failures.get(relative_path).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileDigest> {
        self.entries.values()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failures.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Every path seen on this side, hashed or not.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .chain(self.failures.keys())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Digest representing the whole target.
    ///
    /// Directories combine the per-file digests in path order; a single file
    /// is represented by its own digest, or `None` when it was not hashed.
    pub fn aggregate(&self) -> Option<String> {
        match self.kind {
            PathKind::Directory => Some(combine_digests(
                self.entries.values().map(|d| d.hex_digest.as_str()),
            )),
            PathKind::File => self.entries.values().next().map(|d| d.hex_digest.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub path: String,
    pub remote_digest: String,
    pub local_digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every path hashed on both sides and all digests agree
    Verified,
    /// At least one digest differs between device and local copy
    MismatchDetected,
    /// Nothing differs, but some paths could not be checked on one side
    Incomplete,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Verified => write!(f, "integrity verified"),
            Verdict::MismatchDetected => write!(f, "integrity failed"),
            Verdict::Incomplete => write!(f, "integrity incomplete"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub target: String,
    pub kind: PathKind,
    pub matched: Vec<String>,
    pub mismatched: Vec<Mismatch>,
    pub missing_remote: Vec<MissingEntry>,
    pub missing_local: Vec<MissingEntry>,
    pub remote_aggregate: Option<String>,
    pub local_aggregate: Option<String>,
    pub verdict: Verdict,
}

impl ComparisonResult {
    pub fn total_paths(&self) -> usize {
        self.matched.len()
            + self.mismatched.len()
            + self.missing_remote.len()
            + self.missing_local.len()
    }

    pub fn is_verified(&self) -> bool {
        self.verdict == Verdict::Verified
    }

    pub fn missing_count(&self) -> usize {
        self.missing_remote.len() + self.missing_local.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Complete,
    /// The pull reported errors but data arrived; some files may be absent
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub local_root: PathBuf,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}

/// Everything recorded for one successfully processed target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: RemotePath,
    pub files_enumerated: usize,
    pub transfer: TransferOutcome,
    pub remote: DigestSet,
    pub local: DigestSet,
    pub comparison: ComparisonResult,
    pub started_at: String,
    pub finished_at: String,
}

/// A target that was aborted or never attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target: String,
    pub error: String,
}

/// Record of one logical extraction run, written as the integrity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub examiner: String,
    pub host: String,
    pub device: String,
    pub started_at: String,
    pub finished_at: String,
    pub targets: Vec<TargetReport>,
    pub failures: Vec<TargetFailure>,
}

impl ExtractionRecord {
    pub fn verified_count(&self) -> usize {
        self.targets.iter().filter(|t| t.comparison.is_verified()).count()
    }

    pub fn mismatch_count(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| t.comparison.verdict == Verdict::MismatchDetected)
            .count()
    }
}
