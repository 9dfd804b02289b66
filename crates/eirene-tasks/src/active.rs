use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Mutable handle for one in-flight task, owned exclusively by the
/// [`crate::manager::TaskManager`] that created it.
///
/// `done` is a `watch` channel rather than a one-shot: both a queued updater
/// draining this record *and* the pool awaiting completion during teardown
/// need to observe the same completion signal, and a one-shot channel can
/// only ever be consumed once.
#[derive(Debug)]
pub struct ActiveTaskRecord {
    pub id: String,
    pub cancel: CancellationToken,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    queued: AtomicBool,
}

impl ActiveTaskRecord {
    pub(crate) fn new(id: String, cancel: CancellationToken) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self { id, cancel, done_tx, done_rx, queued: AtomicBool::new(false) }
    }

    /// Marks `queued = true` unless it was already set. Returns `true` if
    /// this call is the one that set it (i.e. the caller may proceed to
    /// await completion); `false` means another updater already queued
    /// itself and this call must return without effect.
    pub(crate) fn try_queue(&self) -> bool {
        !self.queued.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn mark_done(&self) {
        let _ = self.done_tx.send(true);
    }

    pub(crate) async fn wait_done(&self) {
        let mut rx = self.done_rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        *self.done_rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_queue_attempt_succeeds() {
        let record = ActiveTaskRecord::new("id".into(), CancellationToken::new());
        assert!(record.try_queue());
        assert!(!record.try_queue());
        assert!(!record.try_queue());
    }

    #[tokio::test]
    async fn wait_done_resolves_after_mark_done() {
        let record = ActiveTaskRecord::new("id".into(), CancellationToken::new());
        assert!(!record.is_done());

        let waiter = {
            let record = &record;
            async move { record.wait_done().await }
        };

        tokio::join!(waiter, async {
            record.mark_done();
        });

        assert!(record.is_done());
    }

    #[tokio::test]
    async fn wait_done_returns_immediately_if_already_done() {
        let record = ActiveTaskRecord::new("id".into(), CancellationToken::new());
        record.mark_done();
        tokio::time::timeout(std::time::Duration::from_millis(50), record.wait_done())
            .await
            .expect("wait_done should not block once already done");
    }
}
