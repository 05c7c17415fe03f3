//! Remote Enumerator: detect a target's kind and list the files beneath it.

use crate::errors::{AcqError, AcqResult};
use crate::models::{PathKind, RemotePath};
use crate::transport::{commands, RemoteShell};

/// Files reachable under one target, sorted lexicographically.
#[derive(Debug, Clone)]
pub struct RemoteListing {
    pub target: RemotePath,
    pub files: Vec<String>,
}

impl RemoteListing {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Determine whether `raw_path` is a file or directory on the device.
pub async fn detect_kind(shell: &dyn RemoteShell, raw_path: &str) -> AcqResult<PathKind> {
    let output = shell.shell(&commands::path_kind(raw_path)).await?;
    if !output.success() {
        return Err(AcqError::RemoteUnreachable(format!(
            "path kind check for {} failed: {}",
            raw_path,
            output.failure_reason()
        )));
    }

    match output.stdout.trim() {
        "dir" => Ok(PathKind::Directory),
        "file" => Ok(PathKind::File),
        "missing" => Err(AcqError::PathNotFound(raw_path.to_string())),
        other => Err(AcqError::RemoteUnreachable(format!(
            "unexpected path kind answer for {}: {:?}",
            raw_path, other
        ))),
    }
}

/// Enumerate `raw_path` on the device.
///
/// Each call re-queries the device; nothing is cached between calls.
pub async fn enumerate(shell: &dyn RemoteShell, raw_path: &str) -> AcqResult<RemoteListing> {
    let kind = detect_kind(shell, raw_path).await?;
    let target = RemotePath::new(raw_path, kind);

    if kind == PathKind::File {
        return Ok(RemoteListing {
            target,
            files: vec![raw_path.to_string()],
        });
    }

    let output = shell.shell(&commands::list_files(raw_path)).await?;
    let mut files: Vec<String> = output
        .stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if !output.success() {
        if files.is_empty() {
            return Err(AcqError::EnumerationFailed {
                path: raw_path.to_string(),
                message: output.failure_reason(),
            });
        }
        // find keeps going past unreadable subdirectories
        log::warn!(
            target: "acquisition",
            "Listing of {} was incomplete: {}",
            raw_path,
            output.failure_reason()
        );
    }

    files.sort();
    files.dedup();

    Ok(RemoteListing { target, files })
}
