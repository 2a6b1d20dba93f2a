//! Lifecycle owner for the three workers

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::cleanup::{CleanupHandle, CleanupWorker};
use super::error::Result;
use super::runner::WorkerHandle;
use super::search::{SearchStateHandle, SearchWorker};
use super::updater::{UpdaterHandle, WallpaperUpdater};
use super::{Notifier, WorkerEvent, WorkerKind};
use crate::booru::ImageBoard;
use crate::config::ConfigStore;
use crate::observability::Metrics;
use crate::wallpaper::WallpaperSetter;

const EVENT_CAPACITY: usize = 256;

/// Starts the workers as a unit and funnels their events into one stream
///
/// Each coordinator owns exactly one worker of each kind; starting consumes
/// the workers, so a second instance cannot be spawned through it.
pub struct WorkerCoordinator {
    search: SearchStateHandle,
    updater: UpdaterHandle,
    cleanup: CleanupHandle,
    metrics: Arc<Metrics>,
    tx: broadcast::Sender<WorkerEvent>,
    /// Subscribed before any worker started, so no early event is lost
    first_rx: Option<broadcast::Receiver<WorkerEvent>>,
    handles: Vec<WorkerHandle>,
}

impl WorkerCoordinator {
    /// Start Search (with its synchronous first refresh), then Updater, then Cleanup
    pub async fn start(
        config: ConfigStore,
        board: Arc<dyn ImageBoard>,
        setter: Arc<dyn WallpaperSetter>,
    ) -> Result<Self> {
        let (tx, first_rx) = broadcast::channel(EVENT_CAPACITY);
        let metrics = Arc::new(Metrics::new());
        let notifier = |kind| Notifier::new(kind, tx.clone());

        let search = SearchWorker::new(
            config.clone(),
            board.clone(),
            notifier(WorkerKind::Search),
            metrics.clone(),
        );
        let search_state = search.state();
        let search_handle = search.start().await?;

        let updater = WallpaperUpdater::new(
            config.clone(),
            board,
            setter,
            search_state.clone(),
            notifier(WorkerKind::Updater),
            metrics.clone(),
        );
        let updater_handle = updater.handle();
        let updater_join = updater.start();

        let cleanup = CleanupWorker::new(config, notifier(WorkerKind::Cleanup), metrics.clone());
        let cleanup_handle = cleanup.handle();
        let cleanup_join = cleanup.start();

        info!("All workers started");

        Ok(Self {
            search: search_state,
            updater: updater_handle,
            cleanup: cleanup_handle,
            metrics,
            tx,
            first_rx: Some(first_rx),
            handles: vec![search_handle, updater_join, cleanup_join],
        })
    }

    /// Stream of state-changed and fatal events from every worker
    pub fn events(&mut self) -> broadcast::Receiver<WorkerEvent> {
        self.first_rx.take().unwrap_or_else(|| self.tx.subscribe())
    }

    pub fn search(&self) -> &SearchStateHandle {
        &self.search
    }

    pub fn updater(&self) -> &UpdaterHandle {
        &self.updater
    }

    pub fn cleanup(&self) -> &CleanupHandle {
        &self.cleanup
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|handle| !handle.is_finished())
    }

    /// Stop and join every worker in reverse start order
    ///
    /// Fatal errors were already published when they happened and are not
    /// returned again. Safe to call more than once.
    pub async fn stop(&mut self) {
        while let Some(mut handle) = self.handles.pop() {
            if let Err(err) = handle.stop().await {
                debug!(worker = %handle.kind(), error = %err, "Worker had already failed");
            }
        }
    }
}
