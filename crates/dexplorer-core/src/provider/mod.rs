//! Provider trait and implementations for the read-only catalog API.

pub mod mock;
pub mod pokeapi;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{Category, Stats};

/// Boxed future returned by [`CatalogProvider`] methods.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Any failure talking to the catalog API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error(
        "rate limited (429){}",
        .retry_after.map(|d| format!(", retry after {:.1}s", d.as_secs_f64())).unwrap_or_default()
    )]
    RateLimited { retry_after: Option<Duration> },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Map a reqwest failure for `url` onto the taxonomy.
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// One lightweight row of the catalog index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexItem {
    pub name: String,
    /// Location of the full record.
    pub url: String,
}

/// One page of the catalog index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub results: Vec<IndexItem>,
}

/// A full record: identity, categories in slot order, and numeric attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub id: u32,
    pub name: String,
    pub categories: Vec<Category>,
    pub stats: Stats,
}

/// One description variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorText {
    pub text: String,
    pub language: String,
}

impl FlavorText {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// A read-only paginated catalog.
pub trait CatalogProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// `limit` index rows starting at `offset`.
    fn fetch_index<'a>(&'a self, offset: usize, limit: usize) -> ProviderFuture<'a, IndexPage>;

    /// Full record at an index row's `url`.
    fn fetch_record<'a>(&'a self, url: &'a str) -> ProviderFuture<'a, EntryRecord>;

    /// Full record by identifier.
    fn fetch_record_by_id<'a>(&'a self, id: u32) -> ProviderFuture<'a, EntryRecord>;

    /// Every description variant of the species with this identifier.
    fn fetch_flavor_texts<'a>(&'a self, id: u32) -> ProviderFuture<'a, Vec<FlavorText>>;
}
