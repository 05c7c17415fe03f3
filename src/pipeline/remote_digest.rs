//! Remote Digest Collector: hash files on the device before they move.

use super::enumerator::RemoteListing;
use crate::digest::parse_digest_token;
use crate::errors::AcqResult;
use crate::models::{DigestSet, FileDigest, Side};
use crate::transport::{commands, RemoteShell, TransportError};
use indicatif::ProgressBar;

/// Run `sha256sum` on the device for every listed file.
///
/// A file whose hash cannot be obtained is recorded as a failure and the
/// batch carries on. Only a transport that has gone away aborts the stage.
pub async fn collect(
    shell: &dyn RemoteShell,
    listing: &RemoteListing,
    progress: &ProgressBar,
) -> AcqResult<DigestSet> {
    let mut set = DigestSet::new(Side::Remote, listing.target.kind());
    progress.set_length(listing.files.len() as u64);

    for remote_file in &listing.files {
        let relative = listing.target.relative_path_of(remote_file);
        progress.set_message(relative.clone());

        match shell.shell(&commands::hash_file(remote_file)).await {
            Ok(output) if output.success() => match parse_digest_token(&output.stdout) {
                Some(hex_digest) => {
                    if !set.insert(FileDigest::new(relative.clone(), hex_digest)) {
                        log::warn!(target: "acquisition", "Duplicate remote entry ignored: {}", relative);
                    }
                }
                None => {
                    log::warn!(target: "acquisition", "Hash unavailable for {}: unparseable sha256sum output", remote_file);
                    set.record_failure(relative, "unparseable sha256sum output");
                }
            },
            Ok(output) => {
                let reason = output.failure_reason();
                log::warn!(target: "acquisition", "Hash unavailable for {}: {}", remote_file, reason);
                set.record_failure(relative, reason);
            }
            Err(TransportError::Timeout { timeout, .. }) => {
                log::warn!(target: "acquisition", "Hash unavailable for {}: timed out after {}s", remote_file, timeout.as_secs());
                set.record_failure(relative, format!("timed out after {}s", timeout.as_secs()));
            }
            Err(err @ TransportError::Unreachable(_)) => return Err(err.into()),
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{combine_digests, sha256_hex};
    use crate::errors::AcqError;
    use crate::pipeline::enumerator::enumerate;
    use crate::transport::fake::FakeDevice;

    #[tokio::test]
    async fn test_collects_relative_digests() {
        let device = FakeDevice::new()
            .with_file("/sdcard/DCIM/a.jpg", b"jpeg")
            .with_file("/sdcard/notes.txt", b"abc");
        let listing = enumerate(&device, "/sdcard").await.unwrap();

        let set = collect(&device, &listing, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("notes.txt").unwrap().hex_digest, sha256_hex(b"abc"));
        assert_eq!(
            set.aggregate().unwrap(),
            combine_digests([sha256_hex(b"jpeg").as_str(), sha256_hex(b"abc").as_str()])
        );
    }

    #[tokio::test]
    async fn test_permission_error_is_recorded_not_raised() {
        let device = FakeDevice::new()
            .with_file("/data/ok", b"fine")
            .with_file("/data/secret", b"locked")
            .deny_hash("/data/secret");
        let listing = enumerate(&device, "/data").await.unwrap();

        let set = collect(&device, &listing, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.failure("secret").unwrap().contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_never_issues_writes() {
        let device = FakeDevice::new().with_file("/sdcard/a", b"a");
        let listing = enumerate(&device, "/sdcard").await.unwrap();
        collect(&device, &listing, &ProgressBar::hidden()).await.unwrap();

        for command in device.issued() {
            assert!(
                command.starts_with("if [ -d ")
                    || command.starts_with("find ")
                    || command.starts_with("sha256sum "),
                "unexpected command {}",
                command
            );
        }
    }

    #[tokio::test]
    async fn test_transport_loss_aborts() {
        let device = FakeDevice::new().with_file("/sdcard/a", b"a");
        let listing = enumerate(&device, "/sdcard").await.unwrap();
        device.set_offline(true);

        let err = collect(&device, &listing, &ProgressBar::hidden()).await.unwrap_err();
        assert!(matches!(err, AcqError::RemoteUnreachable(_)));
    }
}
