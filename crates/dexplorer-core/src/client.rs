//! Catalog client: index, page, entry and detail fetches over a provider.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join;
use futures_util::{StreamExt, TryStreamExt};

use crate::provider::{CatalogProvider, EntryRecord, FlavorText, IndexPage, ProviderError};
use crate::{Config, Description, Detail, Entry, Stats};

/// Upper bound on a single exponential backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Record fetches kept in flight while enriching an index page.
const RECORD_CONCURRENCY: usize = 16;

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles per attempt (capped at 30s) with up to 10% jitter.
    Exponential,
}

/// Retry policy for the full-index fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(16);
                let base = self
                    .delay
                    .checked_mul(1u32 << shift)
                    .unwrap_or(MAX_BACKOFF)
                    .min(MAX_BACKOFF);
                let jitter_ms = (base.as_millis() as u64 / 10).max(1);
                base + Duration::from_millis(fastrand::u64(0..jitter_ms))
            }
        }
    }
}

/// Description rule: among variants in `language`, the longest wins (ties go
/// to the first); line-feed, carriage-return, vertical-tab and form-feed
/// characters each become one space. No variant in `language` yields
/// [`Description::Unavailable`].
pub fn select_description(variants: &[FlavorText], language: &str) -> Description {
    let mut best: Option<&FlavorText> = None;
    for variant in variants.iter().filter(|v| v.language == language) {
        let longer = best.is_none_or(|b| variant.text.chars().count() > b.text.chars().count());
        if longer {
            best = Some(variant);
        }
    }
    match best {
        Some(variant) => Description::Text(
            variant
                .text
                .chars()
                .map(|c| match c {
                    '\n' | '\r' | '\u{0b}' | '\u{0c}' => ' ',
                    other => other,
                })
                .collect(),
        ),
        None => Description::Unavailable,
    }
}

/// Wraps a [`CatalogProvider`] with the fetch contracts of the viewer.
pub struct CatalogClient {
    provider: Arc<dyn CatalogProvider>,
    asset_base: String,
    max_id: u32,
    language: String,
    retry: RetryPolicy,
    /// Longest server-requested wait honoured between index attempts.
    retry_after_cap: Duration,
}

impl CatalogClient {
    pub fn new(provider: Arc<dyn CatalogProvider>, config: &Config) -> Self {
        Self {
            provider,
            asset_base: config.asset_base.clone(),
            max_id: config.max_id,
            language: config.description_language.clone(),
            retry: config.retry_policy(),
            retry_after_cap: config.request_timeout(),
        }
    }

    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether `id` lies inside `[1, max_id]`.
    pub fn in_range(&self, id: u32) -> bool {
        (1..=self.max_id).contains(&id)
    }

    /// The full index, every row enriched with its record.
    ///
    /// The index call is retried per the retry policy; record fetches are not.
    /// All-or-nothing: any failing record fails the whole batch. Records are
    /// fetched concurrently, in index order.
    pub async fn list_all(&self) -> Result<Vec<Entry>, ProviderError> {
        let page = self.fetch_index_with_retry().await?;
        let entries = self.enrich(&page).await?;
        tracing::info!(
            provider = self.provider.name(),
            entries = entries.len(),
            "full index loaded"
        );
        Ok(entries)
    }

    async fn fetch_index_with_retry(&self) -> Result<IndexPage, ProviderError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.fetch_index(0, self.max_id as usize).await {
                Ok(page) => return Ok(page),
                Err(err) if attempt >= attempts => {
                    tracing::warn!(attempt, error = %err, "index fetch failed, giving up");
                    return Err(ProviderError::Exhausted {
                        attempts,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let wait = self.wait_before_retry(attempt, &err);
                    tracing::warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "index fetch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// The policy delay, stretched to a 429's `Retry-After` (capped at the
    /// request timeout).
    fn wait_before_retry(&self, attempt: u32, err: &ProviderError) -> Duration {
        let delay = self.retry.delay_for(attempt);
        match err {
            ProviderError::RateLimited {
                retry_after: Some(hint),
            } => delay.max((*hint).min(self.retry_after_cap)),
            _ => delay,
        }
    }

    /// `limit` entries starting at `offset`, each enriched with its record.
    /// No retry.
    pub async fn list_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entry>, ProviderError> {
        let page = self.provider.fetch_index(offset, limit).await?;
        let entries = self.enrich(&page).await?;
        tracing::debug!(offset, limit, returned = entries.len(), "page loaded");
        Ok(entries)
    }

    async fn enrich(&self, page: &IndexPage) -> Result<Vec<Entry>, ProviderError> {
        let fetches: Vec<_> = page
            .results
            .iter()
            .map(|item| self.provider.fetch_record(&item.url))
            .collect();
        let records: Vec<EntryRecord> = futures_util::stream::iter(fetches)
            .buffered(RECORD_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(records.into_iter().map(|r| self.to_entry(r)).collect())
    }

    /// One full entry by identifier. Out-of-range ids return `Ok(None)`
    /// without touching the provider.
    pub async fn fetch_by_id(&self, id: u32) -> Result<Option<Entry>, ProviderError> {
        if !self.in_range(id) {
            tracing::debug!(id, max_id = self.max_id, "ignoring out-of-range id");
            return Ok(None);
        }
        let record = self.provider.fetch_record_by_id(id).await?;
        Ok(Some(self.to_entry(record)))
    }

    pub async fn fetch_description(&self, id: u32) -> Result<Description, ProviderError> {
        let variants = self.provider.fetch_flavor_texts(id).await?;
        Ok(select_description(&variants, &self.language))
    }

    pub async fn fetch_stats(&self, id: u32) -> Result<Stats, ProviderError> {
        Ok(self.provider.fetch_record_by_id(id).await?.stats)
    }

    /// Description and stats together.
    pub async fn fetch_detail(&self, id: u32) -> Result<Detail, ProviderError> {
        let (description, stats) =
            try_join(self.fetch_description(id), self.fetch_stats(id)).await?;
        Ok(Detail {
            description: Some(description),
            stats: Some(stats),
        })
    }

    fn to_entry(&self, record: EntryRecord) -> Entry {
        Entry::new(record.id, record.name, record.categories, &self.asset_base)
    }
}
