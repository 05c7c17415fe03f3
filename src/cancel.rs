use crate::errors::{AcqError, AcqResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cooperative cancellation flag.
///
/// The network monitor and the console trip it; the pipeline and the action
/// runner check it between stages, never in the middle of a remote command.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Fail with [`AcqError::Cancelled`] if cancellation was requested.
    pub fn check(&self, next_stage: &'static str) -> AcqResult<()> {
        if self.is_cancelled() {
            log::warn!(target: "acquisition", "Cancellation requested, not starting {}", next_stage);
            return Err(AcqError::Cancelled(next_stage));
        }
        Ok(())
    }
}
