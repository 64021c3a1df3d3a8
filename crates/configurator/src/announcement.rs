//! Change announcements for downstream consumers.
//!
//! The relay sits on a bounded channel and never blocks the watch loop:
//! when the buffer is full the announcement is dropped and counted. Consumers
//! that care about every change must drain the receiver promptly; consumers
//! that only care about the latest state can re-read the configuration on any
//! announcement they do receive.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer size used when none is configured.
pub const DEFAULT_ANNOUNCEMENT_CAPACITY: usize = 128;

/// What happened to the observed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    /// First time the object is seen
    Added,
    /// The object was already cached and has been replaced
    Updated,
    /// The object was removed
    Deleted,
}

impl fmt::Display for AnnouncementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        f.write_str(kind)
    }
}

/// A single change notification.
#[derive(Debug, Clone)]
pub struct Announcement<K> {
    /// Type of change
    pub kind: AnnouncementKind,
    /// Object state as observed by the watch
    pub object: Arc<K>,
}

/// Sending side of the announcement channel.
#[derive(Debug)]
pub struct AnnouncementRelay<K> {
    tx: mpsc::Sender<Announcement<K>>,
    dropped: Arc<AtomicU64>,
}

impl<K> AnnouncementRelay<K> {
    /// Creates a relay with room for `capacity` pending announcements.
    ///
    /// A capacity of zero is raised to one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Announcement<K>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let relay = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (relay, rx)
    }

    /// Shared counter of announcements dropped because the buffer was full.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Announcements dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queues an announcement without waiting.
    ///
    /// Returns true if it was queued.
    pub fn announce(&self, kind: AnnouncementKind, object: Arc<K>) -> bool {
        match self.tx.try_send(Announcement { kind, object }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(announcement)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Announcement channel full, dropping {} announcement ({} dropped so far)",
                    announcement.kind, dropped
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(announcement)) => {
                debug!("No announcement consumer, discarding {} announcement", announcement.kind);
                false
            }
        }
    }
}
