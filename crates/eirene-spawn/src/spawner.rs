use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::throttle::OutputThrottle;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, #[source] source: std::io::Error },

    #[error("failed to wait on child process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("process was cancelled")]
    Cancelled,

    #[error("process exited with {0}")]
    Exit(ExitStatus),
}

/// A command-execution helper bound to a task id, an optional cancellation
/// token, a working directory, and an output throttle policy.
///
/// One [`Spawner`] is built per launch (or per teardown) invocation; see
/// `eirene_tasks::context::LaunchContext::spawn` and
/// `TeardownContext::spawn`.
#[derive(Debug, Clone)]
pub struct Spawner {
    task_id: String,
    cwd: Option<PathBuf>,
    throttle: OutputThrottle,
    cancel: Option<CancellationToken>,
}

impl Spawner {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self { task_id: task_id.into(), cwd: None, throttle: OutputThrottle::unthrottled(), cancel: None }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_throttle(mut self, throttle: OutputThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Runs `program args` to completion, forwarding its output through
    /// `tracing` and racing it against the bound cancellation token, if any.
    pub async fn run(&self, program: &str, args: &[String]) -> Result<(), SpawnError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let out_task =
            tokio::spawn(Self::forward_lines(stdout, self.task_id.clone(), self.throttle, false));
        let err_task =
            tokio::spawn(Self::forward_lines(stderr, self.task_id.clone(), self.throttle, true));

        let status = self.wait(&mut child).await;

        let _ = out_task.await;
        let _ = err_task.await;

        let status = status?;
        if status.success() {
            Ok(())
        } else {
            Err(SpawnError::Exit(status))
        }
    }

    async fn wait(&self, child: &mut Child) -> Result<ExitStatus, SpawnError> {
        match &self.cancel {
            None => child.wait().await.map_err(SpawnError::Wait),
            Some(cancel) => {
                tokio::select! {
                    status = child.wait() => status.map_err(SpawnError::Wait),
                    _ = cancel.cancelled() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        Err(SpawnError::Cancelled)
                    }
                }
            }
        }
    }

    async fn forward_lines(
        stream: impl tokio::io::AsyncRead + Unpin,
        task_id: String,
        throttle: OutputThrottle,
        is_stderr: bool,
    ) {
        let mut lines = BufReader::new(stream).lines();
        let mut last_emit: Option<Instant> = None;

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(interval) = throttle.interval {
                let now = Instant::now();
                if let Some(last) = last_emit {
                    if now.duration_since(last) < interval {
                        continue;
                    }
                }
                last_emit = Some(now);
            }

            if is_stderr {
                warn!(target: "spawn", task_id = %task_id, "{line}");
            } else {
                info!(target: "spawn", task_id = %task_id, "{line}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn runs_successful_command() {
        let spawner = Spawner::new("t1");
        spawner.run("true", &[]).await.expect("true should succeed");
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let spawner = Spawner::new("t1");
        let err = spawner.run("false", &[]).await.unwrap_err();
        assert!(matches!(err, SpawnError::Exit(_)));
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let spawner = Spawner::new("t1").with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move {
            spawner.run("sleep", &["5".to_string()]).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SpawnError::Cancelled)));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let spawner = Spawner::new("t1");
        let err = spawner.run("definitely-not-a-real-binary", &[]).await.unwrap_err();
        assert!(matches!(err, SpawnError::Spawn { .. }));
    }
}
