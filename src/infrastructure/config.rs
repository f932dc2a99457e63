//! Configuration management for the storage core
//!
//! Loads configuration from config.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use crate::hot_path::history_page::{DEFAULT_PAGE_CAPACITY, MIN_PAGE_CAPACITY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage core configuration
///
/// Loaded from config.toml (or `$CONFIG_PATH`) at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Symbol cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// History buffer settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Synthetic replay settings for the binary
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Symbol cache configuration
///
/// Signed on purpose: out-of-range values are rejected by the cache builder
/// with a parameter-specific error instead of failing TOML parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Idle time before an unreferenced symbol may be evicted
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: i64,

    /// Expected number of symbols, spread over shards
    #[serde(default)]
    pub initial_capacity: i64,

    /// Requested shard count, rounded up to a power of two
    #[serde(default = "default_sharding")]
    pub sharding: i64,
}

/// History buffer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Entries per page
    #[serde(default = "default_page_capacity")]
    pub page_capacity: usize,

    /// Retention limit per buffer (0 = unlimited)
    #[serde(default)]
    pub max_record_count: usize,
}

/// Synthetic feed replayed by the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Records per access pattern
    #[serde(default = "default_record_count")]
    pub record_count: usize,

    /// RNG seed for the random patterns
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            initial_capacity: 0,
            sharding: default_sharding(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_capacity: default_page_capacity(),
            max_record_count: 0,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            record_count: default_record_count(),
            seed: default_seed(),
        }
    }
}

fn default_ttl_ms() -> i64 {
    10_000
}

fn default_sharding() -> i64 {
    16
}

fn default_page_capacity() -> usize {
    DEFAULT_PAGE_CAPACITY
}

fn default_record_count() -> usize {
    10_000
}

fn default_seed() -> u64 {
    0x5eed
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history.page_capacity < MIN_PAGE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "history.page_capacity must be at least {}, got {}",
                MIN_PAGE_CAPACITY, self.history.page_capacity
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_ms, 10_000);
        assert_eq!(config.cache.sharding, 16);
        assert_eq!(config.cache.initial_capacity, 0);
        assert_eq!(config.history.page_capacity, 64);
        assert_eq!(config.history.max_record_count, 0);
        assert_eq!(config.replay.record_count, 10_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [cache]
            ttl_ms = 500

            [history]
            page_capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_ms, 500);
        assert_eq!(config.cache.sharding, 16);
        assert_eq!(config.history.page_capacity, 16);
        assert_eq!(config.replay.seed, 0x5eed);
    }

    #[test]
    fn test_negative_cache_values_parse() {
        // Rejected later by the cache builder, not by the parser
        let config = Config::from_toml("[cache]\nsharding = -1\n").unwrap();
        assert_eq!(config.cache.sharding, -1);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("[cache\nttl_ms = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_page_capacity_too_small() {
        assert!(matches!(
            Config::from_toml("[history]\npage_capacity = 2\n"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
