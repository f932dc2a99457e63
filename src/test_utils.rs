//! Test utilities shared by the unit tests
//!
//! Caches driven by a manual clock and small record fixtures.

use crate::core::clock::ManualClock;
use crate::core::record::{RecordLayout, RecordValues};
use crate::core::SymbolCache;
use std::sync::Arc;

/// Cache with `ttl_ms` and four shards, on a clock starting at 0
pub fn manual_cache(ttl_ms: i64) -> (Arc<SymbolCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let cache = SymbolCache::builder()
        .with_ttl_millis(ttl_ms)
        .with_sharding(4)
        .with_clock(Some(clock.clone()))
        .build()
        .expect("valid test cache configuration");
    (Arc::new(cache), clock)
}

/// Two int fields, no object fields
pub fn trade_layout(id: u32) -> RecordLayout {
    RecordLayout::new(id, "Trade", 2, 0)
}

/// Values for [`trade_layout`] with both fields set to `value`
pub fn trade_values(value: i32) -> RecordValues {
    RecordValues::new(vec![value, value], Vec::new())
}
