use eirene_spawn::Spawner;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// A lightweight, cloneable handle onto the structured span a task's
/// `launch`/`teardown` invocation is running under.
///
/// Call [`TaskLog::enter`] to make the span current for the duration of a
/// block, then use the ordinary `tracing` macros.
#[derive(Debug, Clone)]
pub struct TaskLog {
    span: Span,
}

impl TaskLog {
    pub(crate) fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Passed to [`crate::template::LaunchFn`] on every launch attempt, including
/// retries (the `task_id` is stable across retries of the same update cycle;
/// `attempt` is the 0-based retry counter).
pub struct LaunchContext<C, D> {
    pub entry_id: String,
    pub task_id: String,
    pub attempt: u32,
    pub first: bool,
    pub config: C,
    pub data: D,
    pub cancel: CancellationToken,
    pub log: TaskLog,
    pub spawn: Spawner,
}

/// Passed to [`crate::template::TeardownFn`]. Has no cancellation token: the
/// teardown hook is expected to run to completion.
pub struct TeardownContext {
    pub task_id: String,
    pub log: TaskLog,
    pub spawn: Spawner,
}
