/// The error a `launch` (or `teardown`) callback returns.
///
/// The `Cancelled` variant marks a launch that was aborted rather than
/// failed: the retry loop never retries it and never logs it as a failure.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("task was cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl LaunchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LaunchError::Cancelled)
    }
}

/// Errors detected at [`crate::TaskTemplate`] construction time: the single
/// call site that can fail the whole system synchronously.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("persistent mode requires initial_run to be true")]
    PersistentRequiresInitialRun,

    #[error("retry.factor must be >= 1.0, got {0}")]
    InvalidFactor(f64),
}
