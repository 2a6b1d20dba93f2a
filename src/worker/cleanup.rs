//! Periodic retention pass over the wallpaper cache

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use super::cache::{self, PruneStats};
use super::error::{Result, WorkerError};
use super::runner::{self, Tick, WorkerHandle};
use super::updater::after;
use super::{read, write, Notifier, TICK_INTERVAL};
use crate::config::ConfigStore;
use crate::observability::Metrics;

/// Fixed cadence of the retention pass; deliberately not a setting
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStatus {
    pub next_cleanup: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_removed: usize,
}

#[derive(Debug, Clone)]
pub struct CleanupHandle {
    status: Arc<RwLock<CleanupStatus>>,
    notifier: Notifier,
}

impl CleanupHandle {
    pub fn status(&self) -> CleanupStatus {
        read(&self.status).clone()
    }

    /// Run on the next tick, e.g. after the retention count changed
    pub fn schedule_cleanup(&self) {
        write(&self.status).next_cleanup = Some(Utc::now());
        self.notifier.state_changed();
    }
}

pub struct CleanupWorker {
    config: ConfigStore,
    status: Arc<RwLock<CleanupStatus>>,
    notifier: Notifier,
    metrics: Arc<Metrics>,
}

impl CleanupWorker {
    pub fn new(config: ConfigStore, notifier: Notifier, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            status: Arc::default(),
            notifier,
            metrics,
        }
    }

    pub fn handle(&self) -> CleanupHandle {
        CleanupHandle {
            status: self.status.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn start(self) -> WorkerHandle {
        let notifier = self.notifier.clone();
        runner::spawn(self, TICK_INTERVAL, notifier)
    }

    /// Trim the folder to the configured retention count
    pub async fn cleanup(&self) -> Result<PruneStats> {
        let settings = self.config.snapshot();
        let folder = settings.wallpaper_folder;
        let keep = settings.wallpapers_to_keep as usize;

        let task_folder = folder.clone();
        let stats = tokio::task::spawn_blocking(move || cache::prune(&task_folder, keep))
            .await
            .map_err(|e| WorkerError::Panicked(e.to_string()))?
            .map_err(|e| WorkerError::io(folder, e))?;

        {
            let mut status = write(&self.status);
            status.last_run = Some(Utc::now());
            status.last_removed = stats.removed;
        }
        self.metrics.files_cleaned(stats.removed);
        self.notifier.state_changed();

        Ok(stats)
    }
}

#[async_trait]
impl Tick for CleanupWorker {
    async fn on_tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let horizon = after(now, CLEANUP_INTERVAL.as_secs());

        let due = {
            let mut status = write(&self.status);
            match status.next_cleanup {
                Some(at) if at <= now => true,
                Some(at) if at <= horizon => false,
                _ => {
                    status.next_cleanup = Some(horizon);
                    debug!(next_cleanup = %horizon, "Cleanup scheduled");
                    false
                }
            }
        };

        if due {
            self.cleanup().await?;
            write(&self.status).next_cleanup = Some(after(Utc::now(), CLEANUP_INTERVAL.as_secs()));
        }
        Ok(())
    }
}
