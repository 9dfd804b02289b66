use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eirene_spawn::OutputThrottle;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::context::{LaunchContext, TeardownContext};
use crate::error::{LaunchError, TemplateError};

pub type LaunchFn<C, D> =
    Arc<dyn Fn(LaunchContext<C, D>) -> BoxFuture<'static, Result<(), LaunchError>> + Send + Sync>;

pub type TeardownFn =
    Arc<dyn Fn(TeardownContext) -> BoxFuture<'static, Result<(), LaunchError>> + Send + Sync>;

/// Bounded exponential backoff: `(retries, factor, min_timeout, max_timeout)`.
///
/// The k-th (k >= 1) inter-attempt delay is `min(k * factor * min_timeout,
/// max_timeout)`. Dead in persistent mode; see the module docs on
/// [`crate::retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub factor: f64,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the k-th retry attempt (k >= 1), capped at `max_timeout`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = (attempt as f64) * self.factor * (self.min_timeout.as_millis() as f64);
        let capped = millis.min(self.max_timeout.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Immutable description of a task, shared by reference across every
/// [`crate::manager::TaskManager`] of a pool.
pub struct TaskTemplate<C, D> {
    pub name: String,
    pub id: String,
    pub(crate) launch: LaunchFn<C, D>,
    pub(crate) teardown: Option<TeardownFn>,
    pub parent_cancel: CancellationToken,
    pub cwd: Option<PathBuf>,
    pub throttle: OutputThrottle,
    pub retry: RetryPolicy,
    pub initial_run: bool,
    pub interruptible: bool,
    pub persistent: bool,
}

impl<C, D> TaskTemplate<C, D>
where
    C: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    pub fn builder(name: impl Into<String>, launch: LaunchFn<C, D>) -> TaskTemplateBuilder<C, D> {
        TaskTemplateBuilder::new(name, launch)
    }
}

pub struct TaskTemplateBuilder<C, D> {
    name: String,
    id: Option<String>,
    launch: LaunchFn<C, D>,
    teardown: Option<TeardownFn>,
    parent_cancel: CancellationToken,
    cwd: Option<PathBuf>,
    throttle: OutputThrottle,
    retry: RetryPolicy,
    initial_run: bool,
    interruptible: bool,
    persistent: bool,
}

impl<C, D> TaskTemplateBuilder<C, D> {
    fn new(name: impl Into<String>, launch: LaunchFn<C, D>) -> Self {
        Self {
            name: name.into(),
            id: None,
            launch,
            teardown: None,
            parent_cancel: CancellationToken::new(),
            cwd: None,
            throttle: OutputThrottle::unthrottled(),
            retry: RetryPolicy::default(),
            initial_run: true,
            interruptible: true,
            persistent: false,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn teardown(mut self, teardown: TeardownFn) -> Self {
        self.teardown = Some(teardown);
        self
    }

    pub fn parent_cancel(mut self, cancel: CancellationToken) -> Self {
        self.parent_cancel = cancel;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn throttle(mut self, throttle: OutputThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn initial_run(mut self, initial_run: bool) -> Self {
        self.initial_run = initial_run;
        self
    }

    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn build(self) -> Result<TaskTemplate<C, D>, TemplateError> {
        if self.persistent && !self.initial_run {
            return Err(TemplateError::PersistentRequiresInitialRun);
        }
        if self.retry.factor < 1.0 {
            return Err(TemplateError::InvalidFactor(self.retry.factor));
        }

        let id = self.id.unwrap_or_else(|| nanoid::nanoid!());

        Ok(TaskTemplate {
            name: self.name,
            id,
            launch: self.launch,
            teardown: self.teardown,
            parent_cancel: self.parent_cancel,
            cwd: self.cwd,
            throttle: self.throttle,
            retry: self.retry,
            initial_run: self.initial_run,
            interruptible: self.interruptible,
            persistent: self.persistent,
        })
    }
}
