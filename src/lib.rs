//! Per-symbol storage core for market-data distribution
//!
//! Canonical symbol caching and ordered, paged history buffers that absorb
//! records in any arrival order.

pub mod core;
pub mod hot_path;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use crate::core::{Symbol, SymbolCache, SymbolCacheBuilder};
pub use hot_path::{Collector, HistoryBuffer, HistoryReader, HistorySnapshot, PutOutcome};
pub use infrastructure::config::{CacheConfig, Config, HistoryConfig, ReplayConfig};

use thiserror::Error;

/// Main error type for the storage core
#[derive(Error, Debug)]
pub enum QdError {
    #[error("Symbol cache configuration error: {0}")]
    CacheConfig(#[from] crate::core::CacheConfigError),

    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("Collector error: {0}")]
    Collector(#[from] hot_path::CollectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QdError>;
