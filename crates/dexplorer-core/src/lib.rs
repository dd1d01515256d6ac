use std::time::Duration;
use thiserror::Error;

pub mod category;
pub mod client;
pub mod config_file;
pub mod display;
pub mod provider;
pub mod rate_limit;
pub mod selection;
pub mod session;
pub mod store;
pub mod view;

// Re-export for convenience
pub use category::Category;
pub use client::{Backoff, CatalogClient, RetryPolicy, select_description};
pub use provider::{CatalogProvider, ProviderError};
pub use selection::{SelectionController, SelectionSnapshot};
pub use session::Session;
pub use store::EntryStore;
pub use view::{ListSnapshot, ScrollPosition, ViewEngine, ViewError, ViewPhase};

/// Placeholder shown when the provider has no description in the target language.
pub const DESCRIPTION_UNAVAILABLE: &str = "Description not available";

/// One catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: u32,
    pub name: String,
    /// Derived from `id`, never fetched. See [`image_ref`].
    pub image_ref: String,
    /// Primary then optional secondary category.
    pub categories: Vec<Category>,
    pub detail: Option<Detail>,
}

impl Entry {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        categories: Vec<Category>,
        asset_base: &str,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            image_ref: image_ref(asset_base, id),
            categories,
            detail: None,
        }
    }

    /// Whether the entry satisfies the record invariants (non-empty name,
    /// positive id, one or two categories).
    pub fn is_well_formed(&self) -> bool {
        self.id >= 1 && !self.name.trim().is_empty() && (1..=2).contains(&self.categories.len())
    }
}

/// Image reference for an identifier: `<asset_base>/<id padded to 3 digits>.png`.
pub fn image_ref(asset_base: &str, id: u32) -> String {
    format!("{}/{:03}.png", asset_base.trim_end_matches('/'), id)
}

/// Lazily fetched detail. Description and stats arrive independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detail {
    pub description: Option<Description>,
    pub stats: Option<Stats>,
}

impl Detail {
    /// Fill parts missing from `self` with parts from `other`. Parts already
    /// present are kept.
    pub fn absorb(&mut self, other: Detail) {
        if self.description.is_none() {
            self.description = other.description;
        }
        if self.stats.is_none() {
            self.stats = other.stats;
        }
    }
}

/// Outcome of description selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    Text(String),
    /// The provider had no variant in the target language.
    Unavailable,
}

impl Description {
    pub fn as_str(&self) -> &str {
        match self {
            Description::Text(text) => text,
            Description::Unavailable => DESCRIPTION_UNAVAILABLE,
        }
    }
}

/// Numeric attributes of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub health: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
    pub weight: u32,
    pub height: u32,
}

/// One of the fixed numeric attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Height,
    Weight,
    Health,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl Attribute {
    /// Display order of the detail panel.
    pub const ALL: [Attribute; 8] = [
        Self::Height,
        Self::Weight,
        Self::Health,
        Self::Attack,
        Self::Defense,
        Self::SpecialAttack,
        Self::SpecialDefense,
        Self::Speed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Height => "Height",
            Self::Weight => "Weight",
            Self::Health => "Health",
            Self::Attack => "Attack",
            Self::Defense => "Defense",
            Self::SpecialAttack => "Special Attack",
            Self::SpecialDefense => "Special Defense",
            Self::Speed => "Speed",
        }
    }

    /// Upper bound used when drawing the attribute as a bar.
    pub fn display_max(self) -> u32 {
        match self {
            Self::Height => 200,
            Self::Weight => 10_000,
            Self::Health | Self::Defense | Self::SpecialDefense => 300,
            Self::Attack | Self::SpecialAttack | Self::Speed => 200,
        }
    }
}

impl Stats {
    pub fn get(&self, attribute: Attribute) -> u32 {
        match attribute {
            Attribute::Height => self.height,
            Attribute::Weight => self.weight,
            Attribute::Health => self.health,
            Attribute::Attack => self.attack,
            Attribute::Defense => self.defense,
            Attribute::SpecialAttack => self.special_attack,
            Attribute::SpecialDefense => self.special_defense,
            Attribute::Speed => self.speed,
        }
    }

    /// Fill ratio of an attribute bar, clamped to `0.0..=1.0`.
    pub fn ratio(&self, attribute: Attribute) -> f64 {
        let value = f64::from(self.get(attribute));
        (value / f64::from(attribute.display_max())).clamp(0.0, 1.0)
    }
}

/// Ordering of the visible list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    ByIdentifier,
    ByName,
}

impl SortMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::ByIdentifier => "id",
            Self::ByName => "name",
        }
    }
}

/// Selection navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("config error: {0}")]
    Config(String),
}

/// Configuration for the catalog client and view engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider API root, e.g. `https://pokeapi.co/api/v2`.
    pub api_base: String,
    /// Image asset root used to derive [`Entry::image_ref`].
    pub asset_base: String,
    /// Highest valid identifier (N).
    pub max_id: u32,
    /// Entries per load-more page.
    pub page_size: usize,
    /// Size of the latency-optimization page requested on mount.
    pub first_page_size: usize,
    pub request_timeout_secs: u64,
    /// Attempts made around the full-index fetch.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub backoff: Backoff,
    /// Language tag used to select the description.
    pub description_language: String,
    /// Provider requests allowed per second.
    pub requests_per_second: u32,
    /// Window in which scroll events collapse into one load-more request.
    pub scroll_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://pokeapi.co/api/v2".to_string(),
            asset_base: "https://assets.pokemon.com/assets/cms2/img/pokedex/full".to_string(),
            max_id: 1025,
            page_size: 10,
            first_page_size: 10,
            request_timeout_secs: 10,
            retry_attempts: 5,
            retry_delay_ms: 1000,
            backoff: Backoff::Fixed,
            description_language: "en".to_string(),
            requests_per_second: 50,
            scroll_debounce_ms: 500,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
            backoff: self.backoff,
        }
    }

    /// Number of load-more pages needed to cover `[1, max_id]`.
    pub fn page_ceiling(&self) -> usize {
        (self.max_id as usize).div_ceil(self.page_size.max(1))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_id == 0 {
            return Err(CoreError::Config("max_id must be at least 1".into()));
        }
        if self.page_size == 0 || self.first_page_size == 0 {
            return Err(CoreError::Config("page sizes must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(CoreError::Config("retry_attempts must be at least 1".into()));
        }
        if self.requests_per_second == 0 {
            return Err(CoreError::Config(
                "requests_per_second must be at least 1".into(),
            ));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(CoreError::Config(format!(
                "api_base is not an http(s) URL: {}",
                self.api_base
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_zero_pads_to_three_digits() {
        assert_eq!(image_ref("https://a.test/full", 7), "https://a.test/full/007.png");
        assert_eq!(image_ref("https://a.test/full/", 25), "https://a.test/full/025.png");
        assert_eq!(image_ref("https://a.test/full", 1025), "https://a.test/full/1025.png");
    }

    #[test]
    fn well_formed_requires_one_or_two_categories() {
        let mut entry = Entry::new(1, "bulbasaur", vec![Category::Grass], "x");
        assert!(entry.is_well_formed());
        entry.categories.clear();
        assert!(!entry.is_well_formed());
        entry.categories = vec![Category::Grass, Category::Poison, Category::Bug];
        assert!(!entry.is_well_formed());
    }

    #[test]
    fn detail_absorb_keeps_existing_parts() {
        let mut detail = Detail {
            description: Some(Description::Text("first".into())),
            stats: None,
        };
        detail.absorb(Detail {
            description: Some(Description::Text("second".into())),
            stats: Some(Stats {
                speed: 45,
                ..Stats::default()
            }),
        });
        assert_eq!(detail.description, Some(Description::Text("first".into())));
        assert_eq!(detail.stats.map(|s| s.speed), Some(45));
    }

    #[test]
    fn stat_ratio_is_clamped() {
        let stats = Stats {
            attack: 100,
            weight: 20_000,
            ..Stats::default()
        };
        assert!((stats.ratio(Attribute::Attack) - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.ratio(Attribute::Weight), 1.0);
    }

    #[test]
    fn page_ceiling_covers_max_id() {
        let config = Config::default();
        assert_eq!(config.page_ceiling(), 103);
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
        let bad = Config {
            page_size: 0,
            ..Config::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn unavailable_description_has_placeholder_text() {
        assert_eq!(Description::Unavailable.as_str(), DESCRIPTION_UNAVAILABLE);
    }
}
