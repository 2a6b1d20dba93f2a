//! Image board access
//!
//! [`ImageBoard`] is the seam the workers talk through; [`BooruClient`] is the
//! reqwest-backed implementation for the Derpibooru JSON API.

pub mod client;
pub mod error;
pub mod models;
pub mod utils;

pub use client::{BooruClient, ClientConfig};
pub use error::{BooruError, Result};
pub use models::{page_count, Image, SearchPage, SearchQuery};

use async_trait::async_trait;
use bytes::Bytes;

/// Minimal search contract: total count, paged results, direct image URL
#[async_trait]
pub trait ImageBoard: Send + Sync {
    /// Run one search request
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;

    /// Fetch the bytes behind a direct image URL
    async fn download(&self, url: &str) -> Result<Bytes>;
}
