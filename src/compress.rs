//! Evidence bundle: the whole output folder packed into one archive.

use crate::digest::hash_file;
use crate::errors::{AcqError, AcqResult};
use clap::ValueEnum;
use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fs::{File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleFormat {
    Zip,
    Tar,
    TarGz,
}

impl BundleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            BundleFormat::Zip => "zip",
            BundleFormat::Tar => "tar",
            BundleFormat::TarGz => "tar.gz",
        }
    }
}

/// `<case_name>_<case_number>.<ext>` with spaces as underscores, or
/// `output.<ext>` when no case number was given.
pub fn bundle_name(case_name: &str, case_number: Option<&str>, format: BundleFormat) -> String {
    let base = match case_number.map(str::trim).filter(|n| !n.is_empty()) {
        Some(number) => format!("{}_{}", case_name.trim().replace(' ', "_"), number),
        None => "output".to_string(),
    };
    format!("{}.{}", base, format.extension())
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub path: PathBuf,
    pub sha256: String,
    pub entries: usize,
}

/// Files under `folder` as (absolute, archive name) pairs, sorted by name.
fn collect_entries(folder: &Path, skip: &Path) -> AcqResult<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(folder).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf);
            AcqError::io(io::Error::new(io::ErrorKind::Other, e.to_string()), path)
        })?;
        if entry.file_type().is_dir() || entry.path() == skip {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(|e| AcqError::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name));
    }
    Ok(entries)
}

fn write_zip(bundle: File, entries: &[(PathBuf, String)], progress: &ProgressBar) -> AcqResult<()> {
    let mut zip = zip::ZipWriter::new(bundle);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (path, name) in entries {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path).map_err(|e| AcqError::io(e, path.clone()))?;
        io::copy(&mut source, &mut zip).map_err(|e| AcqError::io(e, path.clone()))?;
        log::debug!(target: "compress", "Added {}", name);
        progress.inc(1);
    }
    zip.finish()?;
    Ok(())
}

/// Append `data` as `name` with exactly the length recorded in `metadata`.
///
/// `iterator.log` is still being written while the bundle is built; a file
/// that grows or shrinks after its header is written is cut or zero-padded
/// so the entries after it stay aligned.
fn append_snapshot<W: Write, R: Read>(
    builder: &mut tar::Builder<W>,
    name: &str,
    metadata: &Metadata,
    data: R,
) -> io::Result<()> {
    let len = metadata.len();
    let mut header = tar::Header::new_gnu();
    header.set_metadata(metadata);
    header.set_size(len);
    builder.append_data(&mut header, name, data.take(len).chain(io::repeat(0)).take(len))
}

fn append_tar<W: Write>(
    builder: &mut tar::Builder<W>,
    entries: &[(PathBuf, String)],
    progress: &ProgressBar,
) -> AcqResult<()> {
    for (path, name) in entries {
        let file = File::open(path).map_err(|e| AcqError::io(e, path.clone()))?;
        let metadata = file.metadata().map_err(|e| AcqError::io(e, path.clone()))?;
        append_snapshot(builder, name, &metadata, file).map_err(|e| AcqError::io(e, path.clone()))?;
        log::debug!(target: "compress", "Added {}", name);
        progress.inc(1);
    }
    Ok(())
}

/// Pack `folder` into `destination/<name>` and return the bundle with its
/// SHA-256. The bundle is never packed into itself.
pub fn compress_folder(
    folder: &Path,
    format: BundleFormat,
    destination: &Path,
    name: &str,
    progress: &ProgressBar,
) -> AcqResult<Bundle> {
    if !folder.is_dir() {
        return Err(AcqError::InvalidInput(format!(
            "{} does not exist or is not a directory",
            folder.display()
        )));
    }
    std::fs::create_dir_all(destination).map_err(|e| AcqError::io(e, destination.to_path_buf()))?;
    let bundle_path = destination.join(name);

    let entries = collect_entries(folder, &bundle_path)?;
    if entries.is_empty() {
        return Err(AcqError::InvalidInput(format!(
            "{} is empty and cannot be compressed",
            folder.display()
        )));
    }

    log::info!(
        target: "compress",
        "Compressing {} files from {} into {}",
        entries.len(),
        folder.display(),
        bundle_path.display()
    );
    progress.set_length(entries.len() as u64);

    let file = File::create(&bundle_path).map_err(|e| AcqError::io(e, bundle_path.clone()))?;
    match format {
        BundleFormat::Zip => write_zip(file, &entries, progress)?,
        BundleFormat::Tar => {
            let mut builder = tar::Builder::new(file);
            append_tar(&mut builder, &entries, progress)?;
            builder.finish().map_err(|e| AcqError::io(e, bundle_path.clone()))?;
        }
        BundleFormat::TarGz => {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            append_tar(&mut builder, &entries, progress)?;
            builder
                .into_inner()
                .and_then(|gz| gz.finish())
                .map_err(|e| AcqError::io(e, bundle_path.clone()))?;
        }
    }
    progress.finish_and_clear();

    let sha256 = hash_file(&bundle_path).map_err(|e| AcqError::io(e, bundle_path.clone()))?;
    log::info!(
        target: "compress",
        "Bundle {} written (sha256 {})",
        bundle_path.display(),
        sha256
    );
    Ok(Bundle {
        path: bundle_path,
        sha256,
        entries: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn evidence() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("4_data_extraction/logical_data_extraction/sdcard")).unwrap();
        std::fs::write(root.join("iterator.log"), "log line\n").unwrap();
        std::fs::write(
            root.join("4_data_extraction/logical_data_extraction/sdcard/a.txt"),
            "abc",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("2_device_information")).unwrap();
        std::fs::write(root.join("2_device_information/device_information.txt"), "props").unwrap();
        tmp
    }

    #[test]
    fn test_bundle_name() {
        assert_eq!(
            bundle_name("Case Alpha", Some("042"), BundleFormat::TarGz),
            "Case_Alpha_042.tar.gz"
        );
        assert_eq!(bundle_name("Case Alpha", None, BundleFormat::Zip), "output.zip");
        assert_eq!(bundle_name("x", Some(" "), BundleFormat::Tar), "output.tar");
    }

    #[test]
    fn test_zip_is_sorted_and_skips_itself() {
        let tmp = evidence();
        let bundle = compress_folder(
            tmp.path(),
            BundleFormat::Zip,
            tmp.path(),
            "output.zip",
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(bundle.entries, 3);
        assert_eq!(bundle.sha256, hash_file(&bundle.path).unwrap());

        let archive = zip::ZipArchive::new(File::open(&bundle.path).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(!names.contains(&"output.zip"));
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn test_tar_gz_contents() {
        let tmp = evidence();
        let out = TempDir::new().unwrap();
        let bundle = compress_folder(
            tmp.path(),
            BundleFormat::TarGz,
            out.path(),
            "case_1.tar.gz",
            &ProgressBar::hidden(),
        )
        .unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&bundle.path).unwrap()));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            if name.ends_with("a.txt") {
                let mut text = String::new();
                entry.read_to_string(&mut text).unwrap();
                assert_eq!(text, "abc");
            }
            names.push(name);
        }
        assert_eq!(
            names,
            vec![
                "2_device_information/device_information.txt",
                "4_data_extraction/logical_data_extraction/sdcard/a.txt",
                "iterator.log",
            ]
        );
    }

    #[test]
    fn test_log_written_during_tar_keeps_archive_aligned() {
        let tmp = evidence();
        let log = tmp.path().join("iterator.log");
        let metadata = std::fs::metadata(&log).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&log)
            .unwrap()
            .write_all(b"written while archiving\n")
            .unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        append_snapshot(&mut builder, "iterator.log", &metadata, File::open(&log).unwrap()).unwrap();
        // A file that shrank is padded back to its header length
        append_snapshot(&mut builder, "short.txt", &metadata, &b"log"[..]).unwrap();
        let after = tmp.path().join("2_device_information/device_information.txt");
        append_snapshot(
            &mut builder,
            "device_information.txt",
            &std::fs::metadata(&after).unwrap(),
            File::open(&after).unwrap(),
        )
        .unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut contents = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            contents.push((entry.path().unwrap().to_string_lossy().into_owned(), data));
        }
        assert_eq!(
            contents,
            vec![
                ("iterator.log".to_string(), b"log line\n".to_vec()),
                ("short.txt".to_string(), b"log\0\0\0\0\0\0".to_vec()),
                ("device_information.txt".to_string(), b"props".to_vec()),
            ]
        );
    }

    #[test]
    fn test_empty_and_missing_folders() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let hidden = ProgressBar::hidden();

        let err = compress_folder(&empty, BundleFormat::Tar, tmp.path(), "output.tar", &hidden).unwrap_err();
        assert!(matches!(err, AcqError::InvalidInput(msg) if msg.contains("empty")));

        let err = compress_folder(&tmp.path().join("nope"), BundleFormat::Tar, tmp.path(), "output.tar", &hidden)
            .unwrap_err();
        assert!(matches!(err, AcqError::InvalidInput(_)));
    }
}
