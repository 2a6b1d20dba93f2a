//! Tracing setup and worker counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honoring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed (tests); keep the first one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Counters shared by the workers
#[derive(Debug, Default)]
pub struct Metrics {
    searches: AtomicU64,
    wallpapers_set: AtomicU64,
    transient_errors: AtomicU64,
    files_cleaned: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_completed(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "searches", "Metric incremented");
    }

    pub fn wallpaper_set(&self) {
        self.wallpapers_set.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "wallpapers_set", "Metric incremented");
    }

    pub fn transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "transient_errors", "Metric incremented");
    }

    pub fn files_cleaned(&self, count: usize) {
        self.files_cleaned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            wallpapers_set: self.wallpapers_set.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            files_cleaned: self.files_cleaned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub searches: u64,
    pub wallpapers_set: u64,
    pub transient_errors: u64,
    pub files_cleaned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.search_completed();
        metrics.search_completed();
        metrics.transient_error();
        metrics.files_cleaned(3);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                searches: 2,
                wallpapers_set: 0,
                transient_errors: 1,
                files_cleaned: 3,
            }
        );
    }
}
