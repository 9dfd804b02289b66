use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::active::ActiveTaskRecord;
use crate::retry::{self, RetryRun};
use crate::template::TaskTemplate;

/// Owns at most one [`ActiveTaskRecord`] for a given pool slot and serializes
/// updates against it.
///
/// `state` is a `tokio::sync::Mutex` rather than a plain field because
/// `update` must `await` a prior task's completion while holding the manager
/// exclusively (a second concurrent `update` call on the same manager is not
/// expected by the pool, which drives slots sequentially, but `teardown` can
/// race it from the pool's shutdown path).
pub struct TaskManager<C, D> {
    template: Arc<TaskTemplate<C, D>>,
    entry_id: String,
    state: Arc<Mutex<State>>,
    first_event: AtomicBool,
    teardown_initiated: AtomicBool,
}

struct State {
    active: Option<Arc<ActiveTaskRecord>>,
}

impl<C, D> TaskManager<C, D>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    pub fn new(template: Arc<TaskTemplate<C, D>>, entry_id: impl Into<String>) -> Self {
        Self {
            template,
            entry_id: entry_id.into(),
            state: Arc::new(Mutex::new(State { active: None })),
            first_event: AtomicBool::new(true),
            teardown_initiated: AtomicBool::new(false),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Request that this slot reflect `(config, data)`: interrupts or queues
    /// behind the in-flight task according to the template's interruptible
    /// and persistent flags, then launches against the new pair.
    pub async fn update(&self, config: C, data: D) {
        let is_first = self.first_event.swap(false, Ordering::SeqCst);

        let mut guard = self.state.lock().await;

        if let Some(active) = guard.active.clone() {
            if self.template.interruptible {
                active.cancel.cancel();
                if !active.try_queue() {
                    return;
                }
            } else if self.template.persistent {
                warn!(
                    entry_id = %self.entry_id,
                    "update ignored: template is non-interruptible and persistent"
                );
                return;
            } else if !active.try_queue() {
                return;
            }

            // Drop the lock while waiting so teardown/other callers aren't blocked
            // on this in-flight task.
            drop(guard);
            active.wait_done().await;
            guard = self.state.lock().await;
        }

        if self.teardown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if is_first && !self.template.initial_run {
            debug!(entry_id = %self.entry_id, "initial_run is false, skipping first event's launch");
            return;
        }

        let cancel = self.template.parent_cancel.child_token();
        let record = Arc::new(ActiveTaskRecord::new(nanoid::nanoid!(), cancel.clone()));
        guard.active = Some(record.clone());
        drop(guard);

        let manager_entry_id = self.entry_id.clone();
        let template = self.template.clone();
        let state = self.state.clone();

        let handle: JoinHandle<()> = tokio::spawn(run_and_clear(
            template,
            manager_entry_id,
            record.id.clone(),
            is_first,
            config,
            data,
            cancel,
            record,
            state,
        ));
        // Detach: the spawned task clears `active` itself on completion via
        // an identity check, so a racing updater's newer record is never
        // clobbered.
        drop(handle);
    }

    /// Request graceful shutdown. Idempotent.
    pub async fn teardown(&self) {
        if self.teardown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }

        let guard = self.state.lock().await;
        if let Some(active) = &guard.active {
            active.cancel.cancel();
        }
        drop(guard);

        if let Some(teardown) = self.template.teardown.clone() {
            let task_id = nanoid::nanoid!();
            let span = tracing::info_span!("teardown", entry_id = %self.entry_id, task_id = %task_id);
            let log = crate::context::TaskLog::new(span);
            let spawn = eirene_spawn::Spawner::new(task_id.clone())
                .with_cwd(self.template.cwd.clone())
                .with_throttle(self.template.throttle);

            let ctx = crate::context::TeardownContext { task_id, log, spawn };
            if let Err(err) = teardown(ctx).await {
                warn!(entry_id = %self.entry_id, error = %err, "teardown hook failed");
            }
        }
    }

    /// Awaits the active task's completion, if any, swallowing its result.
    /// Used by the pool during its own teardown pass.
    pub async fn wait_active(&self) {
        let active = {
            let guard = self.state.lock().await;
            guard.active.clone()
        };
        if let Some(active) = active {
            active.wait_done().await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_and_clear<C, D>(
    template: Arc<TaskTemplate<C, D>>,
    entry_id: String,
    task_id: String,
    first: bool,
    config: C,
    data: D,
    cancel: CancellationToken,
    record: Arc<ActiveTaskRecord>,
    state: Arc<Mutex<State>>,
) where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    let result =
        retry::run(RetryRun { template, entry_id: entry_id.clone(), task_id, first, config, data, cancel }).await;

    if let Err(err) = result {
        if !err.is_cancelled() {
            debug!(entry_id = %entry_id, error = %err, "task finished in failure");
        }
    }

    record.mark_done();

    // Clear `active` only if it still points at this record: a later
    // updater may already have installed its own record by the time this
    // one's retry loop returns.
    let mut guard = state.lock().await;
    if let Some(current) = &guard.active {
        if Arc::ptr_eq(current, &record) {
            guard.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::time::Duration;

    use futures::FutureExt;

    use super::*;
    use crate::context::LaunchContext;
    use crate::error::LaunchError;
    use crate::template::RetryPolicy;

    fn template<F>(persistent: bool, interruptible: bool, launch: F) -> Arc<TaskTemplate<(), ()>>
    where
        F: Fn(LaunchContext<(), ()>) -> futures::future::BoxFuture<'static, Result<(), LaunchError>>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(
            TaskTemplate::builder("t", Arc::new(launch))
                .interruptible(interruptible)
                .persistent(persistent)
                .retry(RetryPolicy {
                    retries: 0,
                    factor: 1.0,
                    min_timeout: Duration::from_millis(1),
                    max_timeout: Duration::from_millis(5),
                })
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn initial_run_false_skips_first_event_but_not_later_ones() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let tmpl = Arc::new(
            TaskTemplate::builder(
                "t",
                Arc::new(move |_ctx: LaunchContext<(), ()>| {
                    calls2.fetch_add(1, AtomicOrdering::SeqCst);
                    async { Ok(()) }.boxed()
                }),
            )
            .initial_run(false)
            .build()
            .unwrap(),
        );
        let manager = TaskManager::new(tmpl, "0");

        manager.update((), ()).await;
        manager.wait_active().await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

        manager.update((), ()).await;
        manager.wait_active().await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_event_flag_is_true_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let tmpl = template(false, true, move |ctx| {
            let seen = seen2.clone();
            async move {
                seen.lock().await.push(ctx.first);
                Ok(())
            }
            .boxed()
        });
        let manager = TaskManager::new(tmpl, "0");

        manager.update((), ()).await;
        manager.wait_active().await;
        manager.update((), ()).await;
        manager.wait_active().await;

        let seen = seen.lock().await;
        assert_eq!(*seen, vec![true, false]);
    }

    #[tokio::test]
    async fn interruptible_update_cancels_in_flight_task() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled2 = cancelled.clone();
        let tmpl = template(false, true, move |ctx| {
            let cancelled = cancelled2.clone();
            async move {
                ctx.cancel.cancelled().await;
                cancelled.store(true, AtomicOrdering::SeqCst);
                Err(LaunchError::Cancelled)
            }
            .boxed()
        });
        let manager = TaskManager::new(tmpl, "0");

        manager.update((), ()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.update((), ()).await;

        assert!(cancelled.load(AtomicOrdering::SeqCst));
    }

    /// spec.md §8's interruptible-determinism law: N events arriving while
    /// one task is active and one is already queued collapse into exactly
    /// two further launches (one combined drain, then one final), however
    /// many extra events land in a burst.
    #[tokio::test]
    async fn interruptible_burst_collapses_to_two_further_launches() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let tmpl = template(false, true, move |ctx| {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, AtomicOrdering::SeqCst);
                ctx.cancel.cancelled().await;
                Err(LaunchError::Cancelled)
            }
            .boxed()
        });
        let manager = TaskManager::new(tmpl, "0");

        manager.update((), ()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        // Burst of three concurrent events while task 1 is active: only the
        // first to arrive sets `queued`, drains task 1, and relaunches
        // (task 2); the other two see `queued` already true and return
        // without effect.
        tokio::join!(manager.update((), ()), manager.update((), ()), manager.update((), ()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);

        // A second burst while task 2 is active collapses the same way,
        // into exactly one more launch (task 3) -- not a third or fourth.
        tokio::join!(manager.update((), ()), manager.update((), ()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_interruptible_persistent_ignores_update() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let tmpl = template(true, false, move |_ctx| {
            calls2.fetch_add(1, AtomicOrdering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            }
            .boxed()
        });
        let manager = TaskManager::new(tmpl, "0");

        manager.update((), ()).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        manager.update((), ()).await;

        manager.teardown().await;
        manager.wait_active().await;
        assert!(calls.load(AtomicOrdering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_runs_hook_once() {
        let hook_calls = Arc::new(AtomicU32::new(0));
        let hook_calls2 = hook_calls.clone();
        let tmpl = Arc::new(
            TaskTemplate::builder("t", Arc::new(|_ctx: LaunchContext<(), ()>| async { Ok(()) }.boxed()))
                .teardown(Arc::new(move |_ctx| {
                    hook_calls2.fetch_add(1, AtomicOrdering::SeqCst);
                    async { Ok(()) }.boxed()
                }))
                .build()
                .unwrap(),
        );
        let manager = TaskManager::new(tmpl, "0");

        manager.teardown().await;
        manager.teardown().await;

        assert_eq!(hook_calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_launch_after_teardown() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let tmpl = template(false, true, move |_ctx| {
            calls2.fetch_add(1, AtomicOrdering::SeqCst);
            async { Ok(()) }.boxed()
        });
        let manager = TaskManager::new(tmpl, "0");

        manager.teardown().await;
        manager.update((), ()).await;
        manager.wait_active().await;

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }
}
