//! Local Digest Collector: hash the pulled copy on the examiner machine.

use crate::digest::hash_file;
use crate::errors::{AcqError, AcqResult};
use crate::models::{DigestSet, FileDigest, RemotePath, Side};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Hash every file under `local_root`, keyed the same way as the remote set.
///
/// A file that cannot be read is recorded as a failure rather than aborting
/// the walk. Symlinked files are hashed through the link like `sha256sum`
/// does on the device; symlinked directories are never descended into.
pub fn collect_blocking(target: &RemotePath, local_root: &Path) -> AcqResult<DigestSet> {
    let mut set = DigestSet::new(Side::Local, target.kind());

    if !target.is_directory() {
        let key = target.file_name().to_string();
        match hash_file(local_root) {
            Ok(hex) => {
                set.insert(FileDigest::new(key, hex));
            }
            Err(e) => {
                log::warn!(target: "acquisition", "Cannot hash {}: {}", local_root.display(), e);
                set.record_failure(key, e.to_string());
            }
        }
        return Ok(set);
    }

    if !local_root.is_dir() {
        return Err(AcqError::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "local copy is missing"),
            local_root.to_path_buf(),
        ));
    }

    for entry in WalkDir::new(local_root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
                log::warn!(target: "acquisition", "Cannot read {}: {}", path.display(), e);
                if let Some(key) = relative_key(local_root, &path) {
                    set.record_failure(key, e.to_string());
                }
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let Some(key) = relative_key(local_root, entry.path()) else {
            continue;
        };
        match hash_file(entry.path()) {
            Ok(hex) => {
                set.insert(FileDigest::new(key, hex));
            }
            Err(e) => {
                log::warn!(target: "acquisition", "Cannot hash {}: {}", entry.path().display(), e);
                set.record_failure(key, e.to_string());
            }
        }
    }

    Ok(set)
}

/// Async wrapper that keeps file hashing off the runtime's worker threads.
pub async fn collect(target: &RemotePath, local_root: &Path) -> AcqResult<DigestSet> {
    let target = target.clone();
    let local_root = local_root.to_path_buf();
    tokio::task::spawn_blocking(move || collect_blocking(&target, &local_root)).await?
}

/// `/`-separated path of `path` below `root`, or `None` for the root itself.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{combine_digests, sha256_hex, EMPTY_SHA256};
    use crate::models::PathKind;
    use tempfile::TempDir;

    #[test]
    fn test_keys_are_slash_separated() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("DCIM/Camera")).unwrap();
        std::fs::write(tmp.path().join("DCIM/Camera/a.jpg"), b"jpeg").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"abc").unwrap();

        let target = RemotePath::new("/sdcard", PathKind::Directory);
        let set = collect_blocking(&target, tmp.path()).unwrap();
        let paths: Vec<&str> = set.paths().collect();
        assert_eq!(paths, vec!["DCIM/Camera/a.jpg", "notes.txt"]);
    }

    #[test]
    fn test_walk_order_does_not_leak_into_aggregate() {
        // Per-level walk visits "a" before "a.b"; path order puts "a.b" first
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("a/x"), b"x").unwrap();
        std::fs::write(tmp.path().join("a.b"), b"ab").unwrap();

        let target = RemotePath::new("/data", PathKind::Directory);
        let set = collect_blocking(&target, tmp.path()).unwrap();
        assert_eq!(
            set.aggregate().unwrap(),
            combine_digests([sha256_hex(b"ab").as_str(), sha256_hex(b"x").as_str()])
        );
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let target = RemotePath::new("/data/empty", PathKind::Directory);
        let set = collect_blocking(&target, tmp.path()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.aggregate().as_deref(), Some(EMPTY_SHA256));
    }

    #[test]
    fn test_single_file_keyed_by_name() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("hosts");
        std::fs::write(&file, b"abc").unwrap();

        let target = RemotePath::new("/etc/hosts", PathKind::File);
        let set = collect_blocking(&target, &file).unwrap();
        assert_eq!(
            set.get("hosts").unwrap().hex_digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_single_file_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let target = RemotePath::new("/etc/hosts", PathKind::File);
        let set = collect_blocking(&target, &tmp.path().join("hosts")).unwrap();
        assert!(set.is_empty());
        assert!(set.failure("hosts").is_some());
    }

    #[tokio::test]
    async fn test_async_wrapper() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a"), b"a").unwrap();
        let target = RemotePath::new("/sdcard", PathKind::Directory);
        let set = collect(&target, tmp.path()).await.unwrap();
        assert_eq!(set.len(), 1);
    }
}
