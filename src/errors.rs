//! Error types for the ITeratOr acquisition tool.
//!
//! Target-level failures (the transport is gone, the path does not exist,
//! the bulk pull failed) are raised as [`AcqError`]. Per-file problems such
//! as a hash that could not be computed are never raised: they are recorded
//! in the digest sets and surface as "missing" entries in the comparison.

use std::path::PathBuf;
use std::time::Duration;

/// The main error type for acquisition operations.
#[derive(Debug, thiserror::Error)]
pub enum AcqError {
    /// The remote-command transport could not be invoked at all
    #[error("Remote device unreachable: {0}")]
    RemoteUnreachable(String),

    /// The target path does not exist on the device
    #[error("Remote path not found: {0}")]
    PathNotFound(String),

    /// The recursive file listing failed outright
    #[error("Failed to enumerate {path}: {message}")]
    EnumerationFailed { path: String, message: String },

    /// A single file's digest could not be obtained
    #[error("Hash unavailable for {path}: {reason}")]
    HashUnavailable { path: String, reason: String },

    /// The bulk transfer invocation failed and nothing usable arrived
    #[error("Transfer of {path} failed: {message}")]
    TransferFailed { path: String, message: String },

    /// Refusing to pull on top of data that is already on disk
    #[error("Destination already exists: {0:?}")]
    DestinationExists(PathBuf),

    /// A pipeline stage exceeded its time budget
    #[error("Stage '{stage}' timed out after {}s", .timeout.as_secs())]
    StageTimeout { stage: &'static str, timeout: Duration },

    /// Cancellation was requested between stages
    #[error("Acquisition cancelled before stage '{0}'")]
    Cancelled(&'static str),

    /// I/O error (file read/write, permissions, etc.)
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Evidence bundle could not be written
    #[error("Archive error: {0}")]
    Archive(String),

    /// Settings file could not be loaded or saved
    #[error("Invalid settings in {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    /// Bad operator input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tokio task join error
    #[error("Async task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Result type alias using AcqError
pub type AcqResult<T> = Result<T, AcqError>;

impl AcqError {
    /// Create an I/O error with path context
    pub fn io(source: std::io::Error, path: impl Into<Option<PathBuf>>) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error leaves the rest of the run usable.
    ///
    /// A dead transport or an operator cancel makes every following target
    /// fail the same way, so callers stop processing targets on these.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::RemoteUnreachable(_) | Self::Cancelled(_))
    }
}

/// Convert from raw I/O errors (without path context)
impl From<std::io::Error> for AcqError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

impl From<zip::result::ZipError> for AcqError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = AcqError::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            Some(PathBuf::from("/evidence/sdcard")),
        );
        assert!(err.to_string().contains("/evidence/sdcard"));
    }

    #[test]
    fn test_stage_timeout_display() {
        let err = AcqError::StageTimeout {
            stage: "transfer",
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "Stage 'transfer' timed out after 90s");
    }

    #[test]
    fn test_run_fatal_classification() {
        assert!(AcqError::RemoteUnreachable("no devices".into()).is_run_fatal());
        assert!(AcqError::Cancelled("transfer").is_run_fatal());
        assert!(!AcqError::PathNotFound("/nope".into()).is_run_fatal());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let acq_err: AcqError = io_err.into();
        assert!(matches!(acq_err, AcqError::Io { path: None, .. }));
    }
}
