//! HTTP client for the Derpibooru JSON API

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::{BooruError, Result};
use super::models::{SearchBody, SearchPage, SearchQuery};
use super::utils::{classify_transport, error_message, host_label, invalid_body, is_json_content_type};
use super::ImageBoard;

const SEARCH_PATH: &str = "search/images";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Minimum gap between the end of one API request and the start of the next
    pub min_request_spacing: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            min_request_spacing: Duration::from_secs(1),
            user_agent: format!("derpiwall/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Self-throttling Derpibooru client
pub struct BooruClient {
    client: Client,
    config: ClientConfig,
    images_url: Url,
    host: String,
    /// Completion time of the previous API request
    last_request: Mutex<Option<Instant>>,
}

impl BooruClient {
    /// Create a client for the API rooted at `base_url`
    /// (e.g. `https://derpibooru.org/api/v1/json/`)
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self> {
        let images_url = images_url(base_url)?;
        let host = host_label(&images_url);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| BooruError::Client(e.to_string()))?;

        Ok(Self {
            client,
            config,
            images_url,
            host,
            last_request: Mutex::new(None),
        })
    }

    pub fn images_url(&self) -> &Url {
        &self.images_url
    }

    async fn fetch_page(&self, query: &SearchQuery) -> Result<SearchPage> {
        debug!(query = %query.query, page = query.page, per_page = query.per_page, "Searching images");

        let per_page = query.per_page.to_string();
        let page = query.page.to_string();
        let response = self
            .client
            .get(self.images_url.clone())
            .query(&[
                ("key", query.api_key.as_str()),
                ("q", query.query.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(e, &self.host))?;

        let status = response.status();
        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport(e, &self.host))?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "Search request rejected");
            return Err(BooruError::Api {
                code: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
                message,
            });
        }

        if !is_json_content_type(&content_type) {
            return Err(invalid_body(status.as_u16(), &url, &body));
        }

        let parsed: SearchBody = serde_json::from_slice(&body)
            .map_err(|_| invalid_body(status.as_u16(), &url, &body))?;

        let page = SearchPage::from_body(
            parsed,
            query.per_page,
            String::from_utf8_lossy(&body).into_owned(),
        );
        debug!(total = page.total, pages = page.pages, images = page.images.len(), "Search completed");

        Ok(page)
    }
}

#[async_trait]
impl ImageBoard for BooruClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        // Held for the whole request so concurrent callers queue up behind it
        let mut last_request = self.last_request.lock().await;
        if let Some(finished) = *last_request {
            wait_until(finished + self.config.min_request_spacing).await;
        }

        let result = self.fetch_page(query).await;
        *last_request = Some(Instant::now());

        result
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let parsed = Url::parse(url).map_err(|e| BooruError::InvalidUrl(format!("{url}: {e}")))?;
        let host = host_label(&parsed);
        debug!(url, "Starting download");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_transport(e, &host))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BooruError::Api {
                code: status.as_u16(),
                message: format!(
                    "failed to download {url}: HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(e, &host))?;

        debug!(url, size = bytes.len(), "Download completed");

        Ok(bytes)
    }
}

/// `<base>/search/images`, tolerating a base URL without trailing slash
fn images_url(base_url: &str) -> Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    Url::parse(&base)
        .and_then(|url| url.join(SEARCH_PATH))
        .map_err(|e| BooruError::InvalidUrl(format!("{base_url}: {e}")))
}

/// Suspend until `deadline`, logging how long the wait is
async fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        debug!(wait_ms = (deadline - now).as_millis() as u64, "Throttling API request");
        tokio::time::sleep_until(deadline).await;
    }
}
