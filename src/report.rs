//! Integrity report and hash listing for a logical extraction.

use crate::errors::{AcqError, AcqResult};
use crate::models::{DigestSet, ExtractionRecord, PathKind, RemotePath};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "integrity_report.json";
pub const HASHES_FILE: &str = "hashes.txt";

pub struct IntegrityReporter;

impl IntegrityReporter {
    /// Write both report files into `dir` and return their paths.
    pub fn export(record: &ExtractionRecord, dir: &Path) -> AcqResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| AcqError::io(e, dir.to_path_buf()))?;

        let report_path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&report_path, json).map_err(|e| AcqError::io(e, report_path.clone()))?;

        let hashes_path = dir.join(HASHES_FILE);
        std::fs::write(&hashes_path, Self::hash_listing(record))
            .map_err(|e| AcqError::io(e, hashes_path.clone()))?;

        log::info!(
            target: "acquisition",
            "Integrity report written to {}",
            report_path.display()
        );
        Ok(vec![report_path, hashes_path])
    }

    /// One `<hex>  <side>  <device path>` line per digest, remote first.
    ///
    /// Directory targets also get a line for their combined digest, marked
    /// with a trailing `/`.
    pub fn hash_listing(record: &ExtractionRecord) -> String {
        let mut out = String::new();
        for report in &record.targets {
            for set in [&report.remote, &report.local] {
                write_set(&mut out, &report.target, set);
            }
        }
        out
    }
}

fn device_path(target: &RemotePath, relative: &str) -> String {
    match target.kind() {
        PathKind::File => target.raw_path().to_string(),
        PathKind::Directory => format!("{}/{}", target.raw_path().trim_end_matches('/'), relative),
    }
}

fn write_set(out: &mut String, target: &RemotePath, set: &DigestSet) {
    for digest in set.entries() {
        let _ = writeln!(
            out,
            "{}  {}  {}",
            digest.hex_digest,
            set.side(),
            device_path(target, &digest.relative_path)
        );
    }
    if target.is_directory() {
        if let Some(aggregate) = set.aggregate() {
            let _ = writeln!(
                out,
                "{}  {}  {}/",
                aggregate,
                set.side(),
                target.raw_path().trim_end_matches('/')
            );
        }
    }
}
