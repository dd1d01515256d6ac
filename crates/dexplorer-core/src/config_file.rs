use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::Backoff;
use crate::{Config, CoreError};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub provider: Option<ProviderConfig>,
    pub network: Option<NetworkConfig>,
    pub paging: Option<PagingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_base: Option<String>,
    pub asset_base: Option<String>,
    pub description_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    /// `"fixed"` or `"exponential"`.
    pub backoff: Option<String>,
    pub requests_per_second: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagingConfig {
    pub max_id: Option<u32>,
    pub page_size: Option<usize>,
    pub first_page_size: Option<usize>,
    pub scroll_debounce_ms: Option<u64>,
}

/// Platform config directory path: `<config_dir>/dexplorer/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dexplorer").join("config.toml"))
}

/// Load config by cascading CWD `.dexplorer.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".dexplorer.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bp, op) = (
        base.provider.unwrap_or_default(),
        overlay.provider.unwrap_or_default(),
    );
    let (bn, on) = (
        base.network.unwrap_or_default(),
        overlay.network.unwrap_or_default(),
    );
    let (bg, og) = (
        base.paging.unwrap_or_default(),
        overlay.paging.unwrap_or_default(),
    );
    ConfigFile {
        provider: Some(ProviderConfig {
            api_base: op.api_base.or(bp.api_base),
            asset_base: op.asset_base.or(bp.asset_base),
            description_language: op.description_language.or(bp.description_language),
        }),
        network: Some(NetworkConfig {
            timeout_secs: on.timeout_secs.or(bn.timeout_secs),
            retry_attempts: on.retry_attempts.or(bn.retry_attempts),
            retry_delay_ms: on.retry_delay_ms.or(bn.retry_delay_ms),
            backoff: on.backoff.or(bn.backoff),
            requests_per_second: on.requests_per_second.or(bn.requests_per_second),
        }),
        paging: Some(PagingConfig {
            max_id: og.max_id.or(bg.max_id),
            page_size: og.page_size.or(bg.page_size),
            first_page_size: og.first_page_size.or(bg.first_page_size),
            scroll_debounce_ms: og.scroll_debounce_ms.or(bg.scroll_debounce_ms),
        }),
    }
}

pub fn parse_backoff(value: &str) -> Result<Backoff, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fixed" => Ok(Backoff::Fixed),
        "exponential" => Ok(Backoff::Exponential),
        other => Err(CoreError::Config(format!(
            "unknown backoff \"{other}\" (expected \"fixed\" or \"exponential\")"
        ))),
    }
}

impl ConfigFile {
    /// Overwrite `config` with every value set in this file.
    pub fn apply(&self, config: &mut Config) -> Result<(), CoreError> {
        if let Some(p) = &self.provider {
            if let Some(v) = &p.api_base {
                config.api_base = v.clone();
            }
            if let Some(v) = &p.asset_base {
                config.asset_base = v.clone();
            }
            if let Some(v) = &p.description_language {
                config.description_language = v.clone();
            }
        }
        if let Some(n) = &self.network {
            if let Some(v) = n.timeout_secs {
                config.request_timeout_secs = v;
            }
            if let Some(v) = n.retry_attempts {
                config.retry_attempts = v;
            }
            if let Some(v) = n.retry_delay_ms {
                config.retry_delay_ms = v;
            }
            if let Some(v) = &n.backoff {
                config.backoff = parse_backoff(v)?;
            }
            if let Some(v) = n.requests_per_second {
                config.requests_per_second = v;
            }
        }
        if let Some(g) = &self.paging {
            if let Some(v) = g.max_id {
                config.max_id = v;
            }
            if let Some(v) = g.page_size {
                config.page_size = v;
            }
            if let Some(v) = g.first_page_size {
                config.first_page_size = v;
            }
            if let Some(v) = g.scroll_debounce_ms {
                config.scroll_debounce_ms = v;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_deserializes() {
        let toml_str = "[network]\nretry_attempts = 3\nbackoff = \"exponential\"\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert!(parsed.provider.is_none());
        let network = parsed.network.unwrap();
        assert_eq!(network.retry_attempts, Some(3));
        assert!(network.timeout_secs.is_none());
    }

    #[test]
    fn merge_overlay_wins_and_base_survives() {
        let base = ConfigFile {
            provider: Some(ProviderConfig {
                api_base: Some("https://base.test/api".into()),
                description_language: Some("fr".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            provider: Some(ProviderConfig {
                api_base: Some("https://overlay.test/api".into()),
                ..Default::default()
            }),
            paging: Some(PagingConfig {
                page_size: Some(20),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let provider = merged.provider.unwrap();
        assert_eq!(provider.api_base.as_deref(), Some("https://overlay.test/api"));
        assert_eq!(provider.description_language.as_deref(), Some("fr"));
        assert_eq!(merged.paging.unwrap().page_size, Some(20));
    }

    #[test]
    fn apply_overrides_only_set_values() {
        let file: ConfigFile = toml::from_str(
            "[paging]\nmax_id = 151\n[network]\ntimeout_secs = 3\nbackoff = \"Exponential\"\n",
        )
        .unwrap();
        let mut config = Config::default();
        file.apply(&mut config).unwrap();
        assert_eq!(config.max_id, 151);
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.backoff, Backoff::Exponential);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.description_language, "en");
    }

    #[test]
    fn unknown_backoff_is_a_config_error() {
        let file: ConfigFile = toml::from_str("[network]\nbackoff = \"linear\"\n").unwrap();
        let mut config = Config::default();
        assert!(matches!(file.apply(&mut config), Err(CoreError::Config(_))));
    }

    #[test]
    fn load_from_path_reads_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("config.toml");
        std::fs::write(&good, "[provider]\nasset_base = \"https://img.test\"\n").unwrap();
        let loaded = load_from_path(&good).unwrap();
        assert_eq!(
            loaded.provider.unwrap().asset_base.as_deref(),
            Some("https://img.test")
        );

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "this is = = not toml").unwrap();
        assert!(load_from_path(&bad).is_none());
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }
}
