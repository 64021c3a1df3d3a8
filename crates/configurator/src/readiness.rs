//! One-shot "caches are warm" signal.
//!
//! The signal starts open and is closed at most once. Only the sync
//! coordinator closes it; any number of tasks may wait on it. Waiters that
//! can outlive a failed sync should use [`ReadinessSignal::wait_or_cancelled`],
//! since a sync that never completes never closes the signal.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cloneable handle to the readiness flag.
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessSignal {
    /// Creates an open (not ready) signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Whether the signal has been closed.
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Closes the signal. Returns true only for the call that closed it.
    pub(crate) fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    /// Waits until the signal is closed.
    ///
    /// Never returns if the initial sync fails.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Waits until the signal is closed or `stop` is cancelled.
    ///
    /// Returns true if the signal closed.
    pub async fn wait_or_cancelled(&self, stop: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = self.wait() => true,
            () = stop.cancelled() => self.is_ready(),
        }
    }
}
