use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eirene_pool::ManagerPool;
use eirene_watch::{WatchEvent, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub type ConfigLoader<C> = Arc<dyn Fn(&str) -> anyhow::Result<C> + Send + Sync>;
pub type DataDeriver<C, D> = Arc<dyn Fn(&C) -> Vec<Option<D>> + Send + Sync>;

/// Wires a [`Watcher`] to a [`ManagerPool`]: on a debounced change, reads and
/// parses the configuration file and triggers the pool; on shutdown, closes
/// the watcher and runs pool teardown exactly once.
///
/// One process may run several `Supervisor`s concurrently, one per watched
/// task file, each with its own [`CancellationToken`] child of a shared root
/// shutdown signal.
pub struct Supervisor<C, D> {
    config_path: PathBuf,
    debounce: Duration,
    watcher: Box<dyn Watcher>,
    pool: ManagerPool<C, D>,
    load_config: ConfigLoader<C>,
    derive_data: DataDeriver<C, D>,
}

enum DebounceOutcome {
    Reload,
    Shutdown,
}

impl<C, D> Supervisor<C, D>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    pub fn new(
        config_path: impl Into<PathBuf>,
        debounce: Duration,
        watcher: Box<dyn Watcher>,
        pool: ManagerPool<C, D>,
        load_config: ConfigLoader<C>,
        derive_data: DataDeriver<C, D>,
    ) -> Self {
        Self { config_path: config_path.into(), debounce, watcher, pool, load_config, derive_data }
    }

    /// Runs until `shutdown` fires or the watcher reports a backend error.
    /// On either, closes the watcher and awaits pool teardown before
    /// returning.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, tearing down");
                    break;
                }
                event = self.watcher.next_event() => {
                    match event {
                        WatchEvent::Ready => self.reload().await,
                        WatchEvent::Changed => {
                            match self.debounce_changes(&shutdown).await {
                                DebounceOutcome::Reload => self.reload().await,
                                DebounceOutcome::Shutdown => break,
                            }
                        }
                        WatchEvent::Error(err) => {
                            error!(error = %err, "watcher error, initiating shutdown");
                            shutdown.cancel();
                            break;
                        }
                    }
                }
            }
        }

        self.watcher.close();
        self.pool.teardown().await;
    }

    /// Coalesces a burst of `Changed` events into a single reload: restarts
    /// the debounce window on every further `Changed`, fires after `debounce`
    /// of silence.
    async fn debounce_changes(&mut self, shutdown: &CancellationToken) -> DebounceOutcome {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return DebounceOutcome::Shutdown,
                _ = tokio::time::sleep(self.debounce) => return DebounceOutcome::Reload,
                event = self.watcher.next_event() => {
                    match event {
                        WatchEvent::Changed | WatchEvent::Ready => continue,
                        WatchEvent::Error(err) => {
                            error!(error = %err, "watcher error during debounce, initiating shutdown");
                            shutdown.cancel();
                            return DebounceOutcome::Shutdown;
                        }
                    }
                }
            }
        }
    }

    async fn reload(&mut self) {
        let raw = match std::fs::read_to_string(&self.config_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, path = %self.config_path.display(), "failed to read config file");
                return;
            }
        };

        let config = match (self.load_config)(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "failed to parse config file");
                return;
            }
        };

        let data = (self.derive_data)(&config);
        self.pool.trigger(config, data).await;
    }
}
