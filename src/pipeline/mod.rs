//! Hash-verified pull-and-compare pipeline.
//!
//! For each target: enumerate on the device, hash on the device, pull,
//! hash the local copy, compare. Stages run strictly in that order; the
//! cancellation flag is checked before each one and every stage runs under
//! the stage timeout.

pub mod comparator;
pub mod enumerator;
pub mod local_digest;
pub mod remote_digest;
pub mod transfer;

use crate::cancel::CancelFlag;
use crate::errors::{AcqError, AcqResult};
use crate::models::TargetReport;
use crate::transport::RemoteShell;
use crate::ui;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pulled targets are replicated beneath this directory
    pub destination_root: PathBuf,
    pub stage_timeout: Duration,
    pub show_progress: bool,
}

pub struct ExtractionPipeline {
    shell: Arc<dyn RemoteShell>,
    options: PipelineOptions,
    cancel: CancelFlag,
}

impl ExtractionPipeline {
    pub fn new(shell: Arc<dyn RemoteShell>, options: PipelineOptions, cancel: CancelFlag) -> Self {
        Self {
            shell,
            options,
            cancel,
        }
    }

    async fn stage<T, F>(&self, name: &'static str, work: F) -> AcqResult<T>
    where
        F: Future<Output = AcqResult<T>>,
    {
        self.cancel.check(name)?;
        match tokio::time::timeout(self.options.stage_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    target: "acquisition",
                    "Stage '{}' exceeded {}s",
                    name,
                    self.options.stage_timeout.as_secs()
                );
                Err(AcqError::StageTimeout {
                    stage: name,
                    timeout: self.options.stage_timeout,
                })
            }
        }
    }

    /// Run all five stages for one remote path.
    ///
    /// Errors abort this target only; the caller decides whether to go on
    /// with the next one (see [`AcqError::is_run_fatal`]).
    pub async fn run_target(&self, raw_path: &str) -> AcqResult<TargetReport> {
        let started_at = chrono::Local::now().to_rfc3339();
        let shell = self.shell.as_ref();

        let listing = self
            .stage("enumerate", enumerator::enumerate(shell, raw_path))
            .await?;
        log::info!(
            target: "acquisition",
            "Enumerated {}: {} files",
            listing.target,
            listing.len()
        );

        let progress = ui::file_progress("sha256 (device)", !self.options.show_progress);
        let remote = self
            .stage(
                "remote digest",
                remote_digest::collect(shell, &listing, &progress),
            )
            .await?;
        if remote.failure_count() > 0 {
            log::warn!(
                target: "acquisition",
                "{}: {} of {} files could not be hashed on the device",
                raw_path,
                remote.failure_count(),
                listing.len()
            );
        }

        let transfer = self
            .stage(
                "transfer",
                transfer::pull(shell, &listing.target, &self.options.destination_root),
            )
            .await?;
        log::info!(
            target: "acquisition",
            "Transfer of {} {:?}",
            raw_path,
            transfer.status
        );

        let local = self
            .stage(
                "local digest",
                local_digest::collect(&listing.target, &transfer.local_root),
            )
            .await?;

        self.cancel.check("compare")?;
        let comparison = comparator::compare(&listing.target, &remote, &local);

        Ok(TargetReport {
            files_enumerated: listing.len(),
            target: listing.target,
            transfer,
            remote,
            local,
            comparison,
            started_at,
            finished_at: chrono::Local::now().to_rfc3339(),
        })
    }
}
