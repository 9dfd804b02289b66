//! The per-launch retry loop: drives `launch` through bounded, backed-off
//! retries, or forever in persistent mode.
//!
//! In persistent mode `attempt` is never incremented, on success or on
//! failure, so `RetryPolicy::retries` never takes effect and the
//! inter-attempt delay is always zero. This is intentional, not a bug: a
//! persistent task is meant to be relaunched immediately regardless of how
//! many times it has already run.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::context::{LaunchContext, TaskLog};
use crate::error::LaunchError;
use crate::template::TaskTemplate;

pub(crate) struct RetryRun<C, D> {
    pub template: Arc<TaskTemplate<C, D>>,
    pub entry_id: String,
    pub task_id: String,
    pub first: bool,
    pub config: C,
    pub data: D,
    pub cancel: tokio_util::sync::CancellationToken,
}

/// Drives `template.launch` through retries until it succeeds, exhausts
/// its retry budget, or observes cancellation. Never called for a
/// `persistent` template whose `launch` never returns by itself; the
/// persistent branch below just means "don't stop on success or failure".
pub(crate) async fn run<C, D>(run: RetryRun<C, D>) -> Result<(), LaunchError>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    let RetryRun { template, entry_id, task_id, first, config, data, cancel } = run;
    let policy = template.retry;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        if attempt > 0 {
            let delay = policy.delay_for_attempt(attempt);
            tokio::select! {
                _ = cancel.cancelled() => return Err(LaunchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let span = tracing::info_span!(
            "launch",
            entry_id = %entry_id,
            task_id = %task_id,
            attempt,
        );
        let log = TaskLog::new(span);
        let spawn = eirene_spawn::Spawner::new(task_id.clone())
            .with_cwd(template.cwd.clone())
            .with_throttle(template.throttle)
            .with_cancellation(cancel.clone());

        let ctx = LaunchContext {
            entry_id: entry_id.clone(),
            task_id: task_id.clone(),
            attempt,
            first,
            config: config.clone(),
            data: data.clone(),
            cancel: cancel.clone(),
            log,
            spawn,
        };

        let result = (template.launch)(ctx).await;

        match result {
            Ok(()) => {
                if template.persistent {
                    debug!(entry_id = %entry_id, task_id = %task_id, "persistent launch cycle completed, re-running");
                    continue;
                }
                return Ok(());
            }
            Err(LaunchError::Cancelled) => return Err(LaunchError::Cancelled),
            Err(failure) => {
                if template.persistent {
                    error!(entry_id = %entry_id, task_id = %task_id, error = %failure, "persistent launch failed, retrying");
                    continue;
                }

                let retries_left = policy.retries.saturating_sub(attempt);
                if retries_left > 0 {
                    warn!(
                        entry_id = %entry_id,
                        task_id = %task_id,
                        attempt,
                        retries_left,
                        error = %failure,
                        "launch failed, retrying"
                    );
                    attempt += 1;
                    continue;
                }

                error!(entry_id = %entry_id, task_id = %task_id, error = %failure, "launch failed, retries exhausted");
                return Err(failure);
            }
        }
    }
}
