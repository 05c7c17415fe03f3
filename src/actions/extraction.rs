use super::{AcquisitionAction, ActionContext, ActionId, ActionOutcome};
use crate::errors::{AcqError, AcqResult};
use crate::models::{ExtractionRecord, TargetFailure};
use crate::pipeline::{ExtractionPipeline, PipelineOptions};
use crate::report::IntegrityReporter;
use crate::selection::{explicit_targets, parse_root_listing, select_targets};
use crate::transport::commands;
use async_trait::async_trait;

pub struct LogicalExtraction;

/// Targets for this run: the operator's explicit list, or the selection
/// applied to the device root.
pub async fn resolve_targets(ctx: &ActionContext) -> AcqResult<Vec<String>> {
    if !ctx.explicit_targets.is_empty() {
        return Ok(explicit_targets(&ctx.explicit_targets));
    }

    let output = ctx.shell.shell(&commands::list_root()).await?;
    let root = parse_root_listing(&output.stdout);
    if root.is_empty() {
        return Err(AcqError::EnumerationFailed {
            path: "/".to_string(),
            message: output.failure_reason(),
        });
    }
    if !output.success() {
        log::warn!(target: "acquisition", "Root listing incomplete: {}", output.failure_reason());
    }

    Ok(select_targets(
        ctx.selection,
        &root,
        &ctx.settings.excluded_folders,
        &ctx.settings.important_folders,
    ))
}

#[async_trait]
impl AcquisitionAction for LogicalExtraction {
    fn id(&self) -> ActionId {
        ActionId::LogicalExtraction
    }

    async fn run(&self, ctx: &ActionContext) -> AcqResult<ActionOutcome> {
        let targets = resolve_targets(ctx).await?;
        log::info!(
            target: "acquisition",
            "Logical extraction ({}): {} targets",
            ctx.selection,
            targets.len()
        );

        let pipeline = ExtractionPipeline::new(
            ctx.shell.clone(),
            PipelineOptions {
                destination_root: ctx.layout.logical_dir(),
                stage_timeout: ctx.settings.stage_timeout(),
                show_progress: ctx.show_progress,
            },
            ctx.cancel.clone(),
        );

        let mut record = ExtractionRecord {
            examiner: whoami::username(),
            host: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string()),
            device: ctx.shell.describe(),
            started_at: chrono::Local::now().to_rfc3339(),
            finished_at: String::new(),
            targets: Vec::new(),
            failures: Vec::new(),
        };

        let mut fatal: Option<String> = None;
        for target in &targets {
            if let Some(reason) = &fatal {
                record.failures.push(TargetFailure {
                    target: target.clone(),
                    error: format!("not attempted: {}", reason),
                });
                continue;
            }

            match pipeline.run_target(target).await {
                Ok(report) => record.targets.push(report),
                Err(e) => {
                    log::error!(target: "acquisition", "Target {} aborted: {}", target, e);
                    if e.is_run_fatal() {
                        fatal = Some(e.to_string());
                    }
                    record.failures.push(TargetFailure {
                        target: target.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        record.finished_at = chrono::Local::now().to_rfc3339();

        let artifacts = IntegrityReporter::export(&record, &ctx.layout.extraction_dir())?;
        let summary = format!(
            "{} targets: {} verified, {} mismatched, {} incomplete, {} failed",
            targets.len(),
            record.verified_count(),
            record.mismatch_count(),
            record.targets.len() - record.verified_count() - record.mismatch_count(),
            record.failures.len()
        );
        Ok(ActionOutcome {
            action: self.id(),
            summary,
            artifacts,
        })
    }
}
