//! Comparator: decide whether the local copy is identical to the device.

use crate::models::{
    ComparisonResult, DigestSet, Mismatch, MissingEntry, RemotePath, Verdict,
};
use std::collections::BTreeSet;

/// Compare the remote and local digest sets of one target.
///
/// Every path seen on either side lands in exactly one bucket. Nothing is
/// retried: a mismatch is reported as found.
pub fn compare(target: &RemotePath, remote: &DigestSet, local: &DigestSet) -> ComparisonResult {
    let paths: BTreeSet<&str> = remote.paths().chain(local.paths()).collect();

    let mut matched = Vec::new();
    let mut mismatched = Vec::new();
    let mut missing_remote = Vec::new();
    let mut missing_local = Vec::new();

    for path in paths {
        match (remote.get(path), local.get(path)) {
            (Some(r), Some(l)) if r.hex_digest == l.hex_digest => matched.push(path.to_string()),
            (Some(r), Some(l)) => mismatched.push(Mismatch {
                path: path.to_string(),
                remote_digest: r.hex_digest.clone(),
                local_digest: l.hex_digest.clone(),
            }),
            (None, _) => missing_remote.push(MissingEntry {
                path: path.to_string(),
                reason: remote
                    .failure(path)
                    .unwrap_or("not listed on the device")
                    .to_string(),
            }),
            (Some(_), None) => missing_local.push(MissingEntry {
                path: path.to_string(),
                reason: local
                    .failure(path)
                    .unwrap_or("absent from the local copy")
                    .to_string(),
            }),
        }
    }

    let remote_aggregate = remote.aggregate();
    let local_aggregate = local.aggregate();

    let verdict = if !mismatched.is_empty() {
        Verdict::MismatchDetected
    } else if !missing_remote.is_empty() || !missing_local.is_empty() {
        Verdict::Incomplete
    } else if remote_aggregate != local_aggregate {
        Verdict::MismatchDetected
    } else {
        Verdict::Verified
    };

    let result = ComparisonResult {
        target: target.raw_path().to_string(),
        kind: target.kind(),
        matched,
        mismatched,
        missing_remote,
        missing_local,
        remote_aggregate,
        local_aggregate,
        verdict,
    };
    log_verdict(&result);
    result
}

fn log_verdict(result: &ComparisonResult) {
    let remote = result.remote_aggregate.as_deref().unwrap_or("-");
    let local = result.local_aggregate.as_deref().unwrap_or("-");
    match result.verdict {
        Verdict::Verified => log::info!(
            target: "acquisition",
            "{}: {} ({} files, sha256 {})",
            result.target,
            result.verdict,
            result.matched.len(),
            remote
        ),
        Verdict::MismatchDetected => {
            log::error!(
                target: "acquisition",
                "{}: {} (remote {} != local {})",
                result.target,
                result.verdict,
                remote,
                local
            );
            for m in &result.mismatched {
                log::error!(
                    target: "acquisition",
                    "  {} remote {} local {}",
                    m.path,
                    m.remote_digest,
                    m.local_digest
                );
            }
        }
        Verdict::Incomplete => log::warn!(
            target: "acquisition",
            "{}: {} ({} matched, {} missing on device, {} missing locally)",
            result.target,
            result.verdict,
            result.matched.len(),
            result.missing_remote.len(),
            result.missing_local.len()
        ),
    }
}
