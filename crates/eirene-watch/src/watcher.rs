use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// One event observed on the watched configuration file.
///
/// Debouncing is deliberately not this module's job: every filesystem
/// notification is forwarded as a raw `Changed`, and coalescing repeated
/// changes into a single reconciliation pass is `eirene-supervisor`'s
/// responsibility.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Ready,
    Changed,
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to start watcher: {0}")]
    Backend(#[from] notify::Error),
}

/// A source of [`WatchEvent`]s for a single configuration file.
///
/// # Implementation note
///
/// `next_event` returns a [`BoxFuture`] rather than `async fn` so that
/// `Box<dyn Watcher>` stays dyn-compatible, mirroring the stage trait this
/// crate's sibling `eirene-tasks` is grounded on.
pub trait Watcher: Send {
    fn next_event(&mut self) -> BoxFuture<'_, WatchEvent>;
    fn close(&mut self);
}

/// `notify`-backed implementation watching one file (not a directory).
pub struct NotifyWatcher {
    _inner: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
    emitted_ready: bool,
}

impl NotifyWatcher {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            match result {
                Ok(event) => {
                    debug!(?event, "watch event");
                    if matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) {
                        let _ = tx.send(WatchEvent::Changed);
                    }
                }
                Err(err) => {
                    error!(error = %err, "watcher backend error");
                    let _ = tx.send(WatchEvent::Error(err.to_string()));
                }
            }
        })?;

        inner.watch(&path, RecursiveMode::NonRecursive)?;

        Ok(Self { _inner: inner, rx, emitted_ready: false })
    }
}

impl Watcher for NotifyWatcher {
    fn next_event(&mut self) -> BoxFuture<'_, WatchEvent> {
        Box::pin(async move {
            if !self.emitted_ready {
                self.emitted_ready = true;
                return WatchEvent::Ready;
            }
            match self.rx.recv().await {
                Some(event) => event,
                None => WatchEvent::Error("watcher channel closed".to_string()),
            }
        })
    }

    fn close(&mut self) {
        self.rx.close();
    }
}
