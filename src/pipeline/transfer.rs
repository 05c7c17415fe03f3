//! Transfer Engine: one bulk pull per target.

use crate::errors::{AcqError, AcqResult};
use crate::models::{RemotePath, TransferOutcome, TransferStatus};
use crate::transport::{RemoteShell, TransportError};
use std::path::Path;

/// Pull `target` beneath `destination_root`, replicating its device path.
///
/// The local location must not exist yet. A pull that reports errors but
/// still delivered data is recorded as [`TransferStatus::Partial`]; the
/// comparison afterwards shows exactly which files are absent.
pub async fn pull(
    shell: &dyn RemoteShell,
    target: &RemotePath,
    destination_root: &Path,
) -> AcqResult<TransferOutcome> {
    let local_root = destination_root.join(target.local_relative());
    if local_root.exists() {
        return Err(AcqError::DestinationExists(local_root));
    }
    if let Some(parent) = local_root.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AcqError::io(e, parent.to_path_buf()))?;
    }

    log::info!(
        target: "acquisition",
        "Pulling {} to {}",
        target.raw_path(),
        local_root.display()
    );

    let output = match shell.pull(target.raw_path(), &local_root).await {
        Ok(output) => output,
        Err(TransportError::Timeout { timeout, .. }) => {
            return Err(AcqError::TransferFailed {
                path: target.raw_path().to_string(),
                message: format!("pull timed out after {}s", timeout.as_secs()),
            })
        }
        Err(err) => return Err(err.into()),
    };

    let arrived = if target.is_directory() {
        local_root.is_dir()
    } else {
        local_root.is_file()
    };

    match (output.success(), arrived) {
        (true, true) => Ok(TransferOutcome {
            status: TransferStatus::Complete,
            local_root,
            exit_code: output.exit_code,
            message: None,
        }),
        (true, false) if target.is_directory() => {
            // adb does not always materialise an empty directory
            std::fs::create_dir_all(&local_root)
                .map_err(|e| AcqError::io(e, local_root.clone()))?;
            Ok(TransferOutcome {
                status: TransferStatus::Complete,
                local_root,
                exit_code: output.exit_code,
                message: None,
            })
        }
        (false, true) => {
            let reason = output.failure_reason();
            log::warn!(
                target: "acquisition",
                "Pull of {} finished with errors: {}",
                target.raw_path(),
                reason
            );
            Ok(TransferOutcome {
                status: TransferStatus::Partial,
                local_root,
                exit_code: output.exit_code,
                message: Some(reason),
            })
        }
        (true, false) => Err(AcqError::TransferFailed {
            path: target.raw_path().to_string(),
            message: "pull reported success but nothing arrived".to_string(),
        }),
        (false, false) => Err(AcqError::TransferFailed {
            path: target.raw_path().to_string(),
            message: output.failure_reason(),
        }),
    }
}
