//! HTTP provider for the public species catalog API.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{
    CatalogProvider, EntryRecord, FlavorText, IndexItem, IndexPage, ProviderError, ProviderFuture,
};
use crate::rate_limit::{Pacer, rate_limited};
use crate::{Category, Config, CoreError, Stats};

// ── Wire schema ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IndexResponse {
    results: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    id: u32,
    name: String,
    types: Vec<TypeSlot>,
    #[serde(default)]
    stats: Vec<StatSlot>,
    #[serde(default)]
    weight: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct TypeSlot {
    #[serde(default)]
    slot: u32,
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Deserialize)]
struct StatSlot {
    base_stat: u32,
    #[serde(default)]
    stat: Option<NamedResource>,
}

#[derive(Debug, Deserialize)]
struct SpeciesResponse {
    #[serde(default)]
    flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Debug, Deserialize)]
struct FlavorTextEntry {
    flavor_text: String,
    language: NamedResource,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Parse an index response body.
pub fn parse_index(body: &[u8]) -> Result<IndexPage, ProviderError> {
    let raw: IndexResponse = decode(body)?;
    Ok(IndexPage {
        results: raw
            .results
            .into_iter()
            .map(|r| IndexItem {
                name: r.name,
                url: r.url,
            })
            .collect(),
    })
}

/// Parse a full record body. Categories are returned in slot order; a record
/// with zero or more than two categories, or an unknown category, is malformed.
pub fn parse_record(body: &[u8]) -> Result<EntryRecord, ProviderError> {
    let mut raw: RecordResponse = decode(body)?;
    raw.types.sort_by_key(|t| t.slot);

    let categories = raw
        .types
        .iter()
        .map(|t| {
            t.kind
                .name
                .parse::<Category>()
                .map_err(|e| ProviderError::Malformed(format!("record {}: {e}", raw.id)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if !(1..=2).contains(&categories.len()) {
        return Err(ProviderError::Malformed(format!(
            "record {} has {} categories",
            raw.id,
            categories.len()
        )));
    }
    if raw.id == 0 || raw.name.trim().is_empty() {
        return Err(ProviderError::Malformed(format!(
            "record has id {} and name {:?}",
            raw.id, raw.name
        )));
    }

    Ok(EntryRecord {
        id: raw.id,
        name: raw.name,
        categories,
        stats: map_stats(&raw.stats, raw.weight, raw.height),
    })
}

/// Stats are matched by name when the provider names them, else by position
/// (health, attack, defense, special-attack, special-defense, speed).
fn map_stats(slots: &[StatSlot], weight: u32, height: u32) -> Stats {
    let mut stats = Stats {
        weight,
        height,
        ..Stats::default()
    };
    for (position, slot) in slots.iter().enumerate() {
        let key = slot.stat.as_ref().map(|s| s.name.as_str()).unwrap_or_else(|| {
            match position {
                0 => "hp",
                1 => "attack",
                2 => "defense",
                3 => "special-attack",
                4 => "special-defense",
                5 => "speed",
                _ => "",
            }
        });
        match key {
            "hp" => stats.health = slot.base_stat,
            "attack" => stats.attack = slot.base_stat,
            "defense" => stats.defense = slot.base_stat,
            "special-attack" => stats.special_attack = slot.base_stat,
            "special-defense" => stats.special_defense = slot.base_stat,
            "speed" => stats.speed = slot.base_stat,
            _ => {}
        }
    }
    stats
}

/// Parse a species body into its description variants.
pub fn parse_species(body: &[u8]) -> Result<Vec<FlavorText>, ProviderError> {
    let raw: SpeciesResponse = decode(body)?;
    Ok(raw
        .flavor_text_entries
        .into_iter()
        .map(|e| FlavorText {
            text: e.flavor_text,
            language: e.language.name,
        })
        .collect())
}

// ── Provider ────────────────────────────────────────────────────────────

/// The public catalog API over HTTP.
pub struct PokeApi {
    client: reqwest::Client,
    api_base: String,
    timeout: Duration,
    pacer: Arc<Pacer>,
}

impl PokeApi {
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("dexplorer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
            pacer: Arc::new(Pacer::per_second(config.requests_per_second)),
        }
    }

    pub fn index_url(&self, offset: usize, limit: usize) -> String {
        format!("{}/pokemon?limit={limit}&offset={offset}", self.api_base)
    }

    pub fn record_url(&self, id: u32) -> String {
        format!("{}/pokemon/{id}", self.api_base)
    }

    pub fn species_url(&self, id: u32) -> String {
        format!("{}/pokemon-species/{id}", self.api_base)
    }

    /// One paced request. A 429 slows the pacer and comes back as
    /// [`ProviderError::RateLimited`].
    async fn send(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        self.pacer.ready().await;
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, url))?;
        if let Err(err) = rate_limited(resp.status(), resp.headers()) {
            self.pacer.on_throttled();
            return Err(err);
        }
        Ok(resp)
    }

    /// GET `url`. A throttled request is retried once after its
    /// `Retry-After` hint (capped at the request timeout).
    async fn get_body(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let resp = match self.send(url).await {
            Err(ProviderError::RateLimited { retry_after }) => {
                let wait = self.pacer.hold_off(retry_after, self.timeout);
                tracing::debug!(url, wait_ms = wait.as_millis() as u64, "throttled, retrying once");
                tokio::time::sleep(wait).await;
                self.send(url).await?
            }
            other => other?,
        };
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, url))?;
        tracing::trace!(url, bytes = body.len(), "provider response");
        Ok(body.to_vec())
    }
}

impl CatalogProvider for PokeApi {
    fn name(&self) -> &str {
        "PokeAPI"
    }

    fn fetch_index<'a>(&'a self, offset: usize, limit: usize) -> ProviderFuture<'a, IndexPage> {
        Box::pin(async move {
            let url = self.index_url(offset, limit);
            parse_index(&self.get_body(&url).await?)
        })
    }

    fn fetch_record<'a>(&'a self, url: &'a str) -> ProviderFuture<'a, EntryRecord> {
        Box::pin(async move { parse_record(&self.get_body(url).await?) })
    }

    fn fetch_record_by_id<'a>(&'a self, id: u32) -> ProviderFuture<'a, EntryRecord> {
        Box::pin(async move {
            let url = self.record_url(id);
            parse_record(&self.get_body(&url).await?)
        })
    }

    fn fetch_flavor_texts<'a>(&'a self, id: u32) -> ProviderFuture<'a, Vec<FlavorText>> {
        Box::pin(async move {
            let url = self.species_url(id);
            parse_species(&self.get_body(&url).await?)
        })
    }
}
