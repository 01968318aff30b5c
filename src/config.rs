use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::text;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ticker symbols to crawl.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Source codes to crawl each symbol from.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Directory holding shard and canonical database files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Base database file name; shards append "-SYMBOL" before the extension.
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Maximum new articles persisted per symbol x source crawl.
    #[serde(default = "default_discovery_limit")]
    pub discovery_limit: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Consecutive empty listing pages tolerated before a source is
    /// considered out of history.
    #[serde(default = "default_empty_page_ceiling")]
    pub empty_page_ceiling: u32,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub filters: FiltersConfig,
}

/// Policy for access-denied listing pages (rate limiting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_throttle_sleep")]
    pub sleep_secs: u64,

    /// Whether a denied page consumes one empty page toward the termination
    /// ceiling. Sustained throttling then eventually ends the crawl instead
    /// of spinning forever.
    #[serde(default = "default_true")]
    pub denied_counts_toward_ceiling: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_min_len")]
    pub min_len: usize,

    #[serde(default = "default_salpha_min_len")]
    pub salpha_min_len: usize,

    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,

    #[serde(default = "default_salpha_headline_denylist")]
    pub salpha_headline_denylist: Vec<String>,

    #[serde(default = "default_salpha_body_denylist")]
    pub salpha_body_denylist: Vec<String>,
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "AMD"].iter().map(|s| s.to_string()).collect()
}

fn default_sources() -> Vec<String> {
    ["marketwatch", "reuters", "seekingalpha", "benzinga"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_workers() -> usize {
    4
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_db_name() -> String {
    "db.sqlite".to_string()
}

fn default_discovery_limit() -> usize {
    5000
}

fn default_batch_size() -> usize {
    50
}

fn default_empty_page_ceiling() -> u32 {
    365
}

fn default_throttle_sleep() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_min_len() -> usize {
    30
}

fn default_salpha_min_len() -> usize {
    5
}

fn default_denylist() -> Vec<String> {
    text::to_owned_list(text::DEFAULT_DENYLIST)
}

fn default_salpha_headline_denylist() -> Vec<String> {
    text::to_owned_list(text::SALPHA_HEADLINE_DENYLIST)
}

fn default_salpha_body_denylist() -> Vec<String> {
    text::to_owned_list(text::SALPHA_BODY_DENYLIST)
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            sleep_secs: default_throttle_sleep(),
            denied_counts_toward_ceiling: true,
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            salpha_min_len: default_salpha_min_len(),
            denylist: default_denylist(),
            salpha_headline_denylist: default_salpha_headline_denylist(),
            salpha_body_denylist: default_salpha_body_denylist(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            sources: default_sources(),
            max_workers: default_max_workers(),
            data_dir: default_data_dir(),
            db_name: default_db_name(),
            discovery_limit: default_discovery_limit(),
            batch_size: default_batch_size(),
            empty_page_ceiling: default_empty_page_ceiling(),
            throttle: ThrottleConfig::default(),
            filters: FiltersConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` if given, otherwise from the per-user config
    /// location, writing the defaults there on first run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tickernews")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str("symbols = [\"TSLA\"]").unwrap();
        assert_eq!(config.symbols, vec!["TSLA"]);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.empty_page_ceiling, 365);
        assert!(config.throttle.denied_counts_toward_ceiling);
        assert!(!config.filters.denylist.is_empty());
    }

    #[test]
    fn throttle_overrides_parse() {
        let config: Config = toml::from_str(
            "[throttle]\nsleep_secs = 30\ndenied_counts_toward_ceiling = false\n",
        )
        .unwrap();
        assert_eq!(config.throttle.sleep_secs, 30);
        assert!(!config.throttle.denied_counts_toward_ceiling);
    }

    #[test]
    fn round_trips_through_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::default();
        config.save(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.symbols, config.symbols);
        assert_eq!(loaded.discovery_limit, config.discovery_limit);
    }
}
