//! Result-count poller for the configured search string

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::error::Result;
use super::runner::{self, Tick, WorkerHandle};
use super::{read, write, Notifier, TICK_INTERVAL};
use crate::booru::{BooruError, ImageBoard, SearchQuery};
use crate::config::ConfigStore;
use crate::observability::Metrics;

/// Last-known-good search result plus the current transient error
///
/// `result_count` and `page_count` always come from the same response and
/// survive later failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// String behind `result_count`, `None` until the first success
    pub search_string: Option<String>,
    pub result_count: u64,
    pub page_count: u64,
    pub error: Option<String>,
}

/// Read side of the search state, handed to the updater and observers
#[derive(Debug, Clone, Default)]
pub struct SearchStateHandle(Arc<RwLock<SearchState>>);

impl SearchStateHandle {
    pub fn snapshot(&self) -> SearchState {
        read(&self.0).clone()
    }

    pub fn page_count(&self) -> u64 {
        read(&self.0).page_count
    }
}

pub struct SearchWorker {
    config: ConfigStore,
    board: Arc<dyn ImageBoard>,
    state: SearchStateHandle,
    notifier: Notifier,
    metrics: Arc<Metrics>,
    /// Last string a request was issued for, successful or not
    attempted: Option<String>,
}

impl SearchWorker {
    pub fn new(
        config: ConfigStore,
        board: Arc<dyn ImageBoard>,
        notifier: Notifier,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            board,
            state: SearchStateHandle::default(),
            notifier,
            metrics,
            attempted: None,
        }
    }

    pub fn state(&self) -> SearchStateHandle {
        self.state.clone()
    }

    /// Refresh once so dependents see valid state, then start ticking
    pub async fn start(mut self) -> Result<WorkerHandle> {
        self.refresh().await?;
        let notifier = self.notifier.clone();
        Ok(runner::spawn(self, TICK_INTERVAL, notifier))
    }

    /// Query the total result count for the current search string
    ///
    /// API and connection failures become transient state; anything else is
    /// returned. A state-changed notification follows every attempt.
    pub async fn refresh(&mut self) -> Result<()> {
        let settings = self.config.snapshot();
        let search_string = settings.search_string;
        self.attempted = Some(search_string.clone());

        let query = SearchQuery::new(search_string.as_str(), settings.derpibooru_json_api_key);
        debug!(query = %search_string, "Refreshing search result count");

        let result = match self.board.search(&query).await {
            Ok(page) => {
                info!(
                    query = %search_string,
                    total = page.total,
                    pages = page.pages,
                    "Search result count updated"
                );
                let mut state = write(&self.state.0);
                state.search_string = Some(search_string);
                state.result_count = page.total;
                state.page_count = page.pages;
                state.error = None;
                drop(state);
                self.metrics.search_completed();
                Ok(())
            }
            Err(BooruError::Api { message, code, .. }) => {
                warn!(query = %search_string, code, %message, "Search rejected");
                self.set_error(format!("invalid search string: {message}"));
                Ok(())
            }
            Err(err @ BooruError::Connection { .. }) => {
                warn!(query = %search_string, error = %err, "Search failed");
                self.set_error(err.to_string());
                Ok(())
            }
            Err(err) => Err(err.into()),
        };

        self.notifier.state_changed();
        result
    }

    fn set_error(&self, message: String) {
        write(&self.state.0).error = Some(message);
        self.metrics.transient_error();
    }

    fn needs_refresh(&self) -> bool {
        let current = self.config.search_string();
        self.attempted.as_deref() != Some(current.as_str()) || read(&self.state.0).error.is_some()
    }
}

#[async_trait]
impl Tick for SearchWorker {
    async fn on_tick(&mut self) -> Result<()> {
        if self.needs_refresh() {
            self.refresh().await?;
        }
        Ok(())
    }
}
