//! Background workers
//!
//! Three long-lived tasks drive the application: the search poller, the
//! wallpaper updater and the cache cleanup. Each runs its own tick loop
//! (see [`runner`]) and publishes payload-free [`WorkerEvent::StateChanged`]
//! notifications; observers re-read the worker's state on receipt.

pub mod cache;
pub mod cleanup;
pub mod coordinator;
pub mod error;
pub mod runner;
pub mod search;
pub mod updater;

pub use cleanup::{CleanupHandle, CleanupStatus, CleanupWorker, CLEANUP_INTERVAL};
pub use coordinator::WorkerCoordinator;
pub use error::{Result, WorkerError};
pub use runner::{Tick, WorkerHandle};
pub use search::{SearchState, SearchStateHandle, SearchWorker};
pub use updater::{RefreshStatus, UpdaterHandle, WallpaperUpdater, MAX_PROGRESS};

use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;

/// Cadence of every worker's tick loop
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Search,
    Updater,
    Cleanup,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerKind::Search => "search",
            WorkerKind::Updater => "wallpaper-updater",
            WorkerKind::Cleanup => "cleanup",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The worker's state changed; re-read it
    StateChanged(WorkerKind),
    /// The worker stopped on an unrecoverable error
    Fatal { worker: WorkerKind, error: String },
}

/// Publishing side of the worker event stream, bound to one worker
#[derive(Debug, Clone)]
pub struct Notifier {
    kind: WorkerKind,
    tx: broadcast::Sender<WorkerEvent>,
}

impl Notifier {
    pub fn new(kind: WorkerKind, tx: broadcast::Sender<WorkerEvent>) -> Self {
        Self { kind, tx }
    }

    /// Notifier whose events go nowhere, for one-shot use outside the coordinator
    pub fn detached(kind: WorkerKind) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { kind, tx }
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn state_changed(&self) {
        // No subscribers is fine
        let _ = self.tx.send(WorkerEvent::StateChanged(self.kind));
    }

    pub fn fatal(&self, error: &WorkerError) {
        let _ = self.tx.send(WorkerEvent::Fatal {
            worker: self.kind,
            error: error.to_string(),
        });
    }
}

/// Worker state is a plain value; a panic mid-update cannot leave it torn
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notifier_publishes_kind() {
        let (tx, mut rx) = broadcast::channel(8);
        let notifier = Notifier::new(WorkerKind::Cleanup, tx);

        notifier.state_changed();
        notifier.fatal(&WorkerError::Panicked("boom".to_string()));

        assert_eq!(rx.recv().await.unwrap(), WorkerEvent::StateChanged(WorkerKind::Cleanup));
        assert_eq!(
            rx.recv().await.unwrap(),
            WorkerEvent::Fatal {
                worker: WorkerKind::Cleanup,
                error: "worker panicked: boom".to_string(),
            }
        );
    }

    #[test]
    fn test_detached_notifier_does_not_fail() {
        let notifier = Notifier::detached(WorkerKind::Search);
        notifier.state_changed();
        assert_eq!(notifier.kind(), WorkerKind::Search);
    }
}
