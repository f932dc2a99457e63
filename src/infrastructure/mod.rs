//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Logging and metrics
//! - Configuration management
//! - Buffer pooling
//! - Synthetic feeds for replay and benches

pub mod config;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod replay;

pub use metrics::{CacheMetrics, CacheMetricsSnapshot, HistoryCounters, HistorySnapshotMetrics};
pub use pool::{KeyBufferPool, ObjectPool};
pub use replay::AccessPattern;
