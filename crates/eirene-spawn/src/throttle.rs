use std::time::Duration;

/// Output-rate policy applied to a spawned process's stdout/stderr.
///
/// Lines are forwarded through `tracing` as they arrive. When `interval` is
/// set, lines arriving sooner than `interval` after the last forwarded line
/// are dropped rather than queued, so a chatty child process cannot flood the
/// log faster than the configured rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputThrottle {
    pub interval: Option<Duration>,
}

impl OutputThrottle {
    pub fn unthrottled() -> Self {
        Self { interval: None }
    }

    pub fn every(interval: Duration) -> Self {
        Self { interval: Some(interval) }
    }
}
