use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use derpiwall::booru::{BooruClient, ClientConfig};
use derpiwall::config::{ConfigKey, ConfigStore};
use derpiwall::observability::Metrics;
use derpiwall::wallpaper::DesktopWallpaper;
use derpiwall::worker::{
    CleanupWorker, Notifier, SearchWorker, WallpaperUpdater, WorkerCoordinator, WorkerEvent,
    WorkerKind,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

type AppResult<T = ()> = Result<T, Box<dyn Error + Send + Sync>>;

fn client(config: &ConfigStore) -> AppResult<Arc<BooruClient>> {
    let url = config.snapshot().derpibooru_json_api_url;
    Ok(Arc::new(BooruClient::new(&url, ClientConfig::default())?))
}

pub async fn run(config_path: Option<PathBuf>, refresh_now: bool) -> AppResult {
    let config = ConfigStore::load(config_path)?;
    let board = client(&config)?;

    let mut coordinator =
        WorkerCoordinator::start(config, board, Arc::new(DesktopWallpaper)).await?;
    let mut events = coordinator.events();
    if refresh_now {
        coordinator.updater().refresh_now();
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let outcome: AppResult = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = events.recv() => match event {
                Ok(WorkerEvent::StateChanged(kind)) => log_state(&coordinator, kind),
                Ok(WorkerEvent::Fatal { worker, error }) => {
                    error!(%worker, %error, "Fatal worker error; shutting down");
                    break Err(format!("{worker} worker failed: {error}").into());
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    coordinator.stop().await;
    info!(metrics = ?coordinator.metrics().snapshot(), "Workers stopped");
    outcome
}

fn log_state(coordinator: &WorkerCoordinator, kind: WorkerKind) {
    match kind {
        WorkerKind::Search => {
            let state = coordinator.search().snapshot();
            debug!(
                query = ?state.search_string,
                total = state.result_count,
                pages = state.page_count,
                error = ?state.error,
                "Search state"
            );
        }
        WorkerKind::Updater => {
            let status = coordinator.updater().status();
            debug!(
                next_refresh = ?status.next_refresh,
                progress = status.progress,
                error = ?status.error,
                "Updater state"
            );
        }
        WorkerKind::Cleanup => {
            let status = coordinator.cleanup().status();
            debug!(
                next_cleanup = ?status.next_cleanup,
                last_removed = status.last_removed,
                "Cleanup state"
            );
        }
    }
}

/// One search plus one wallpaper update, without the tick loops
pub async fn refresh(config_path: Option<PathBuf>) -> AppResult {
    let config = ConfigStore::load(config_path)?;
    let board = client(&config)?;
    let metrics = Arc::new(Metrics::new());

    let mut search = SearchWorker::new(
        config.clone(),
        board.clone(),
        Notifier::detached(WorkerKind::Search),
        metrics.clone(),
    );
    search.refresh().await?;
    let state = search.state().snapshot();
    if let Some(error) = state.error {
        return Err(error.into());
    }
    info!(total = state.result_count, "Search complete");

    let mut updater = WallpaperUpdater::new(
        config.clone(),
        board,
        Arc::new(DesktopWallpaper),
        search.state(),
        Notifier::detached(WorkerKind::Updater),
        metrics,
    );
    updater.refresh().await?;
    if let Some(error) = updater.handle().status().error {
        return Err(error.into());
    }

    if let Some(path) = config.snapshot().current_wallpaper_path {
        println!("{}", path.display());
    }
    Ok(())
}

pub async fn cleanup(config_path: Option<PathBuf>) -> AppResult {
    let config = ConfigStore::load(config_path)?;
    let worker = CleanupWorker::new(
        config,
        Notifier::detached(WorkerKind::Cleanup),
        Arc::new(Metrics::new()),
    );
    let stats = worker.cleanup().await?;
    println!("removed {} of {} cached wallpapers", stats.removed, stats.scanned);
    Ok(())
}

pub fn show_config(config_path: Option<PathBuf>) -> AppResult {
    let config = ConfigStore::load(config_path)?;
    if let Some(path) = config.path() {
        println!("# {}", path.display());
    }
    for key in ConfigKey::ALL {
        println!("{key} = {}", config.get(key));
    }
    Ok(())
}

pub fn set_config(config_path: Option<PathBuf>, key: &str, value: &str) -> AppResult {
    let config = ConfigStore::load(config_path)?;
    let key: ConfigKey = key.parse()?;
    config.set(key, key.parse_value(value)?)?;
    println!("{key} = {}", config.get(key));
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
