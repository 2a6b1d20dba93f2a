//! Scheduled wallpaper refresh
//!
//! A refresh walks four checkpoints: start, page fetched, image downloaded,
//! done. `progress == MAX_PROGRESS` means nothing is in flight.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::cache::cache_file_path;
use super::error::{Result, WorkerError};
use super::runner::{self, Tick, WorkerHandle};
use super::search::SearchStateHandle;
use super::{read, write, Notifier, TICK_INTERVAL};
use crate::booru::{BooruError, ImageBoard, SearchQuery};
use crate::config::{ConfigError, ConfigStore, Settings};
use crate::observability::Metrics;
use crate::wallpaper::{WallpaperError, WallpaperSetter};

pub const MAX_PROGRESS: u8 = 4;
const PROGRESS_STARTED: u8 = 0;
const PROGRESS_PAGE_FETCHED: u8 = 2;
const PROGRESS_DOWNLOADED: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStatus {
    /// `None` means no refresh is scheduled
    pub next_refresh: Option<DateTime<Utc>>,
    pub progress: u8,
    pub error: Option<String>,
}

impl RefreshStatus {
    pub fn in_flight(&self) -> bool {
        self.progress < MAX_PROGRESS
    }
}

impl Default for RefreshStatus {
    fn default() -> Self {
        Self {
            next_refresh: None,
            progress: MAX_PROGRESS,
            error: None,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    status: RefreshStatus,
    /// Pending refresh came from the auto-refresh policy, not a command
    auto_scheduled: bool,
}

/// Command and read side of the updater
#[derive(Debug, Clone)]
pub struct UpdaterHandle {
    shared: Arc<RwLock<Shared>>,
    notifier: Notifier,
}

impl UpdaterHandle {
    pub fn status(&self) -> RefreshStatus {
        read(&self.shared).status.clone()
    }

    /// Set or clear the next refresh explicitly
    pub fn schedule_refresh(&self, at: Option<DateTime<Utc>>) {
        {
            let mut shared = write(&self.shared);
            shared.status.next_refresh = at;
            shared.auto_scheduled = false;
        }
        debug!(next_refresh = ?at, "Refresh scheduled");
        self.notifier.state_changed();
    }

    pub fn refresh_now(&self) {
        self.schedule_refresh(Some(Utc::now()));
    }

    /// Drop the pending refresh; the next tick recomputes it from settings
    pub fn clear_refresh(&self) {
        self.schedule_refresh(None);
    }
}

enum Failure {
    Transient(String),
    Fatal(WorkerError),
}

impl From<BooruError> for Failure {
    fn from(err: BooruError) -> Self {
        match err {
            BooruError::Api { message, .. } => {
                Failure::Transient(format!("Derpibooru API Error: {message}"))
            }
            err @ BooruError::Connection { .. } => Failure::Transient(err.to_string()),
            other => Failure::Fatal(other.into()),
        }
    }
}

impl From<WallpaperError> for Failure {
    fn from(err: WallpaperError) -> Self {
        Failure::Transient(format!("unable to set wallpaper: {err}"))
    }
}

impl From<ConfigError> for Failure {
    fn from(err: ConfigError) -> Self {
        Failure::Fatal(err.into())
    }
}

pub struct WallpaperUpdater {
    config: ConfigStore,
    board: Arc<dyn ImageBoard>,
    setter: Arc<dyn WallpaperSetter>,
    search: SearchStateHandle,
    shared: Arc<RwLock<Shared>>,
    notifier: Notifier,
    metrics: Arc<Metrics>,
    rng: StdRng,
}

impl WallpaperUpdater {
    /// Schedules an immediate refresh when `refresh_on_startup` is set
    pub fn new(
        config: ConfigStore,
        board: Arc<dyn ImageBoard>,
        setter: Arc<dyn WallpaperSetter>,
        search: SearchStateHandle,
        notifier: Notifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut shared = Shared::default();
        if config.snapshot().refresh_on_startup {
            shared.status.next_refresh = Some(Utc::now());
        }

        Self {
            config,
            board,
            setter,
            search,
            shared: Arc::new(RwLock::new(shared)),
            notifier,
            metrics,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic page/image choice
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn handle(&self) -> UpdaterHandle {
        UpdaterHandle {
            shared: self.shared.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn start(self) -> WorkerHandle {
        let notifier = self.notifier.clone();
        runner::spawn(self, TICK_INTERVAL, notifier)
    }

    /// Fetch a random matching image and set it as the wallpaper
    ///
    /// API, connection and wallpaper-setting failures become transient state.
    /// Progress is reset to max and the schedule recomputed whatever happens.
    pub async fn refresh(&mut self) -> Result<()> {
        let settings = self.config.snapshot();
        let started = Instant::now();

        let result = match self.update(&settings).await {
            Ok(path) => {
                info!(
                    path = %path.display(),
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Wallpaper refreshed"
                );
                write(&self.shared).status.error = None;
                self.metrics.wallpaper_set();
                Ok(())
            }
            Err(Failure::Transient(message)) => {
                warn!(error = %message, "Wallpaper refresh failed");
                write(&self.shared).status.error = Some(message);
                self.metrics.transient_error();
                Ok(())
            }
            Err(Failure::Fatal(err)) => Err(err),
        };

        {
            let mut shared = write(&self.shared);
            shared.status.progress = MAX_PROGRESS;
            if settings.enable_auto_refresh {
                shared.status.next_refresh =
                    Some(after(Utc::now(), settings.auto_refresh_interval_seconds));
                shared.auto_scheduled = true;
            } else {
                shared.status.next_refresh = None;
                shared.auto_scheduled = false;
            }
        }
        self.notifier.state_changed();

        result
    }

    async fn update(&mut self, settings: &Settings) -> std::result::Result<PathBuf, Failure> {
        let page_count = self.search.page_count();
        if page_count == 0 {
            return Err(Failure::Transient("no images found".to_string()));
        }
        self.set_progress(PROGRESS_STARTED);

        let page_number = self.rng.random_range(1..=page_count);
        let query = SearchQuery::new(
            settings.search_string.as_str(),
            settings.derpibooru_json_api_key.as_str(),
        )
        .page(page_number);
        let page = self.board.search(&query).await?;
        self.set_progress(PROGRESS_PAGE_FETCHED);

        if page.images.is_empty() {
            // The result count moved under us since the last search poll
            return Err(Failure::Transient("no images found".to_string()));
        }
        let index = self.rng.random_range(0..page.images.len());
        let image = &page.images[index];
        let (Some(id), Some(view_url)) = (image.id, image.view_url.as_deref()) else {
            return Err(Failure::Fatal(
                BooruError::MalformedResponse(format!(
                    "image without id or view_url in response: {}",
                    page.raw_body
                ))
                .into(),
            ));
        };
        debug!(page = page_number, pages = page.pages, id, "Selected image");

        let bytes = self.board.download(view_url).await?;
        self.set_progress(PROGRESS_DOWNLOADED);

        let folder = &settings.wallpaper_folder;
        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|e| Failure::Fatal(WorkerError::io(folder, e)))?;
        let path = cache_file_path(folder, id);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Failure::Fatal(WorkerError::io(&path, e)))?;

        self.setter.set_wallpaper(&path).await?;
        let config = self.config.clone();
        let saved = path.clone();
        tokio::task::spawn_blocking(move || config.set_current_wallpaper(&saved))
            .await
            .map_err(|e| Failure::Fatal(WorkerError::Panicked(e.to_string())))??;

        info!(page = page_number, pages = page.pages, id, "Wallpaper applied");
        Ok(path)
    }

    fn set_progress(&self, progress: u8) {
        write(&self.shared).status.progress = progress;
        self.notifier.state_changed();
    }

    /// Auto-refresh bookkeeping; true when the schedule changed
    fn apply_policy(&self, settings: &Settings, now: DateTime<Utc>) -> bool {
        let mut shared = write(&self.shared);

        if settings.enable_auto_refresh {
            let horizon = after(now, settings.auto_refresh_interval_seconds);
            if shared.status.next_refresh.is_none_or(|at| at > horizon) {
                shared.status.next_refresh = Some(horizon);
                shared.auto_scheduled = true;
                return true;
            }
        } else if shared.auto_scheduled {
            shared.status.next_refresh = None;
            shared.auto_scheduled = false;
            return true;
        }

        false
    }
}

#[async_trait]
impl Tick for WallpaperUpdater {
    async fn on_tick(&mut self) -> Result<()> {
        let settings = self.config.snapshot();
        let now = Utc::now();

        if self.apply_policy(&settings, now) {
            let next_refresh = read(&self.shared).status.next_refresh;
            debug!(?next_refresh, "Auto-refresh rescheduled");
            self.notifier.state_changed();
        }

        let due = read(&self.shared)
            .status
            .next_refresh
            .is_some_and(|at| at <= now);
        if due {
            self.refresh().await?;
        }
        Ok(())
    }
}

/// `now + seconds`, saturating at the far end of the calendar
pub(crate) fn after(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_adds_seconds() {
        let now = Utc::now();
        assert_eq!(after(now, 60), now + TimeDelta::seconds(60));
    }

    #[test]
    fn test_after_saturates() {
        assert_eq!(after(Utc::now(), u64::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_default_status_is_idle() {
        let status = RefreshStatus::default();
        assert!(!status.in_flight());
        assert_eq!(status.next_refresh, None);
    }
}
