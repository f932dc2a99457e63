//! Shared pool of canonical symbol strings
//!
//! Symbols decoded from the wire are resolved to one shared instance per
//! content so the rest of the server compares them by reference. Entries are
//! kept in one of two modes:
//!
//! - **strong**: `resolve_and_acquire` bumped the reference count, the entry
//!   survives every `clean_up` until the matching `release`
//! - **weak**: an idle timer runs and `clean_up` evicts the entry once it has
//!   been unused for the configured TTL
//!
//! The cache is split into power-of-two shards selected by content hash, each
//! with its own lock. There is no global lock anywhere, `clean_up` walks one
//! shard at a time.
//!
//! # Example
//! ```
//! use rust_qd::core::{KeyBuffer, SymbolCache};
//!
//! let cache = SymbolCache::builder().with_ttl_millis(0).build().unwrap();
//! let a = cache.resolve("IBM");
//!
//! let mut key = KeyBuffer::new();
//! let b = cache.resolve_key(key.embed_str("IBM")).unwrap();
//! assert!(rust_qd::Symbol::ptr_eq(&a, &b));
//! ```

use crate::core::cache_shard::{CacheShard, Probe, Retain};
use crate::core::clock::{Clock, SystemClock};
use crate::core::key::{hash_from_key, is_key, symbol_hash, KeyError, KEY_HEADER_SIZE};
use crate::core::Symbol;
use crate::infrastructure::config::CacheConfig;
use crate::infrastructure::metrics::CacheMetricsSnapshot;
use crossbeam_utils::CachePadded;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Default idle time before an unreferenced symbol may be evicted
pub const DEFAULT_TTL_MILLIS: i64 = 10_000;
/// Default shard fan-out
pub const DEFAULT_SHARDING: i64 = 16;
/// Upper bound on the number of shards
pub const MAX_SHARDS: usize = 1 << 10;

/// Invalid cache construction parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheConfigError {
    #[error("Invalid time-to-live: {0}")]
    InvalidTtl(i64),
    #[error("Invalid initial capacity: {0}")]
    InvalidInitialCapacity(i64),
    #[error("Invalid sharding: {0}")]
    InvalidSharding(i64),
    #[error("Clock must be provided")]
    MissingClock,
}

pub struct SymbolCache {
    shards: Box<[CachePadded<CacheShard>]>,
    mask: usize,
    clock: Arc<dyn Clock>,
    ttl: i64,
}

impl SymbolCache {
    pub fn builder() -> SymbolCacheBuilder {
        SymbolCacheBuilder::new()
    }

    /// Build from the `[cache]` configuration section
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheConfigError> {
        Self::builder()
            .with_ttl_millis(config.ttl_ms)
            .with_initial_capacity(config.initial_capacity)
            .with_sharding(config.sharding)
            .build()
    }

    #[inline(always)]
    fn shard(&self, hash: i32) -> &CacheShard {
        &self.shards[hash as u32 as usize & self.mask]
    }

    /// Canonical instance for `symbol`; inserts it in weak mode when absent.
    /// The reference count is left unchanged.
    #[inline]
    pub fn resolve(&self, symbol: &str) -> Symbol {
        let hash = symbol_hash(symbol);
        self.shard(hash)
            .resolve(hash, symbol, Retain::Weak, &*self.clock)
    }

    /// Same as [`resolve`](Self::resolve) for an embedded key buffer.
    ///
    /// The buffer must carry the header written by
    /// [`embed_key`](crate::core::key::embed_key). Hits and repeated lookups do
    /// not allocate. On a miss the content is decoded, and content that is not
    /// valid UTF-16 or does not match the header hash is rejected without
    /// touching the cache.
    #[inline]
    pub fn resolve_key(&self, key: &[u16]) -> Result<Symbol, KeyError> {
        debug_assert!(is_key(key, KEY_HEADER_SIZE), "buffer has no embedded key header");
        let hash = hash_from_key(key);
        self.shard(hash)
            .resolve_key(hash, key, Retain::Weak, &*self.clock)
    }

    /// Canonical instance for `symbol` with its reference count incremented.
    /// The entry survives `clean_up` until a matching [`release`](Self::release).
    #[inline]
    pub fn resolve_and_acquire(&self, symbol: &str) -> Symbol {
        let hash = symbol_hash(symbol);
        self.shard(hash)
            .resolve(hash, symbol, Retain::Strong, &*self.clock)
    }

    /// Decrement the reference count; the last release starts the idle timer.
    ///
    /// Releasing a symbol that is not acquired (count already 0, or not cached
    /// at all) is a no-op and returns `false`.
    pub fn release(&self, symbol: &str) -> bool {
        let hash = symbol_hash(symbol);
        let released = self
            .shard(hash)
            .release(hash, Probe::Str(symbol), &*self.clock);
        if !released {
            crate::log_cache!(Level::DEBUG, symbol, "release of unacquired symbol ignored");
        }
        released
    }

    /// Cached instance for `symbol`, if any. Does not insert and does not
    /// refresh the idle timer.
    #[inline]
    pub fn get_if_present(&self, symbol: &str) -> Option<Symbol> {
        let hash = symbol_hash(symbol);
        self.shard(hash).get_if_present(hash, Probe::Str(symbol))
    }

    /// [`get_if_present`](Self::get_if_present) for an embedded key buffer
    #[inline]
    pub fn get_key_if_present(&self, key: &[u16]) -> Option<Symbol> {
        debug_assert!(is_key(key, KEY_HEADER_SIZE), "buffer has no embedded key header");
        let hash = hash_from_key(key);
        self.shard(hash).get_if_present(hash, Probe::Key(key))
    }

    /// Outstanding acquisitions of `symbol` (0 when weak or absent)
    pub fn ref_count(&self, symbol: &str) -> u64 {
        let hash = symbol_hash(symbol);
        self.shard(hash).ref_count(hash, Probe::Str(symbol))
    }

    /// Evict unreferenced symbols idle for at least the TTL.
    ///
    /// Safe to call from any thread, concurrently with every other operation.
    /// Returns the number of evicted entries.
    pub fn clean_up(&self) -> usize {
        let expire_time = self.clock.millis().saturating_sub(self.ttl);
        let evicted: usize = self.shards.iter().map(|s| s.clean_up(expire_time)).sum();
        if evicted > 0 {
            crate::log_cache!(Level::DEBUG, evicted, remaining = self.size(), "symbol cache sweep");
        }
        evicted
    }

    /// Remove every symbol, acquired ones included
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }

    pub fn size(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    pub fn ttl_millis(&self) -> i64 {
        self.ttl
    }

    /// Hit/miss/eviction counters summed over all shards
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.shards
            .iter()
            .map(|s| s.metrics.snapshot())
            .fold(CacheMetricsSnapshot::default(), |acc, s| acc.merge(&s))
    }
}

impl std::fmt::Debug for SymbolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolCache")
            .field("shards", &self.shards.len())
            .field("ttl", &self.ttl)
            .field("size", &self.size())
            .finish()
    }
}

/// Builder for [`SymbolCache`]
///
/// Parameters are checked in [`build`](Self::build), each invalid one with its
/// own [`CacheConfigError`] variant.
#[derive(Clone)]
pub struct SymbolCacheBuilder {
    initial_capacity: i64,
    clock: Option<Arc<dyn Clock>>,
    ttl: i64,
    sharding: i64,
}

impl SymbolCacheBuilder {
    pub fn new() -> Self {
        Self {
            initial_capacity: 0,
            clock: Some(Arc::new(SystemClock)),
            ttl: DEFAULT_TTL_MILLIS,
            sharding: DEFAULT_SHARDING,
        }
    }

    /// Total initial capacity, split evenly over shards
    pub fn with_initial_capacity(mut self, initial_capacity: i64) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Clock for eviction timers; `None` is rejected by `build`
    pub fn with_clock(mut self, clock: Option<Arc<dyn Clock>>) -> Self {
        self.clock = clock;
        self
    }

    /// Idle time in millis before an unreferenced symbol may be evicted
    pub fn with_ttl_millis(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        self.with_ttl_millis(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    /// Shard fan-out, rounded up to a power of two and capped at
    /// [`MAX_SHARDS`]; 0 means a single shard.
    pub fn with_sharding(mut self, sharding: i64) -> Self {
        self.sharding = sharding;
        self
    }

    pub fn build(self) -> Result<SymbolCache, CacheConfigError> {
        if self.ttl < 0 {
            return Err(CacheConfigError::InvalidTtl(self.ttl));
        }
        if self.initial_capacity < 0 {
            return Err(CacheConfigError::InvalidInitialCapacity(self.initial_capacity));
        }
        if self.sharding < 0 {
            return Err(CacheConfigError::InvalidSharding(self.sharding));
        }
        let clock = self.clock.ok_or(CacheConfigError::MissingClock)?;

        let shards = usize::try_from(self.sharding)
            .unwrap_or(MAX_SHARDS)
            .clamp(1, MAX_SHARDS)
            .next_power_of_two();
        let shard_capacity = usize::try_from(self.initial_capacity).unwrap_or(0) / shards;
        let shards: Box<[CachePadded<CacheShard>]> = (0..shards)
            .map(|_| CachePadded::new(CacheShard::with_capacity(shard_capacity)))
            .collect();

        crate::log_cache!(
            Level::DEBUG,
            shards = shards.len(),
            ttl_ms = self.ttl,
            "symbol cache created"
        );

        Ok(SymbolCache {
            mask: shards.len() - 1,
            shards,
            clock,
            ttl: self.ttl,
        })
    }
}

impl Default for SymbolCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::key::KeyBuffer;
    use std::thread;

    fn cache_with_clock(ttl: i64) -> (SymbolCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = SymbolCache::builder()
            .with_ttl_millis(ttl)
            .with_sharding(4)
            .with_clock(Some(clock.clone()))
            .build()
            .unwrap();
        (cache, clock)
    }

    #[test]
    fn test_resolve_returns_same_instance() {
        let (cache, _) = cache_with_clock(0);
        let a = cache.resolve("IBM");
        let b = cache.resolve(&String::from("IBM"));
        assert!(Symbol::ptr_eq(&a, &b));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.ref_count("IBM"), 0);
    }

    #[test]
    fn test_resolve_key_matches_resolve() {
        let (cache, _) = cache_with_clock(0);
        let mut key = KeyBuffer::new();
        let a = cache.resolve_key(key.embed_str("MSFT")).unwrap();
        let b = cache.resolve("MSFT");
        assert!(Symbol::ptr_eq(&a, &b));
        let c = cache.get_key_if_present(key.embed_str("MSFT")).unwrap();
        assert!(Symbol::ptr_eq(&a, &c));
        assert!(cache.get_key_if_present(key.embed_str("MSFT.X")).is_none());
    }

    #[test]
    fn test_undecodable_key_is_never_cached() {
        let (cache, _) = cache_with_clock(0);
        let mut key = KeyBuffer::new();
        for _ in 0..5 {
            assert_eq!(
                cache.resolve_key(key.embed_units(&[0x41, 0xD800])),
                Err(KeyError::InvalidUtf16 { position: 1 })
            );
        }
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.metrics().misses, 0);

        // Header hash written for other content
        let mut forged = key.embed_str("IBM").to_vec();
        forged[5] ^= 1;
        assert!(matches!(cache.resolve_key(&forged), Err(KeyError::HashMismatch { .. })));
        assert_eq!(cache.size(), 0);

        // Valid content still resolves, and once
        let a = cache.resolve_key(key.embed_units(&[0x41, 0x42])).unwrap();
        let b = cache.resolve_key(key.embed_units(&[0x41, 0x42])).unwrap();
        assert!(Symbol::ptr_eq(&a, &b));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_weak_symbol_evicted_with_zero_ttl() {
        let (cache, _) = cache_with_clock(0);
        cache.resolve("IBM");
        assert_eq!(cache.clean_up(), 1);
        assert!(cache.get_if_present("IBM").is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_acquired_symbol_survives_until_released() {
        let (cache, _) = cache_with_clock(0);
        let s = cache.resolve_and_acquire("AAPL");
        assert_eq!(cache.clean_up(), 0);
        assert!(Symbol::ptr_eq(&s, &cache.get_if_present("AAPL").unwrap()));
        assert!(cache.release(&s));
        assert_eq!(cache.clean_up(), 1);
        assert!(cache.get_if_present("AAPL").is_none());
    }

    #[test]
    fn test_nested_acquire_needs_matching_releases() {
        let (cache, _) = cache_with_clock(0);
        cache.resolve_and_acquire("GOOG");
        cache.resolve_and_acquire("GOOG");
        assert_eq!(cache.ref_count("GOOG"), 2);
        assert!(cache.release("GOOG"));
        assert_eq!(cache.clean_up(), 0);
        assert!(cache.release("GOOG"));
        assert_eq!(cache.clean_up(), 1);
    }

    #[test]
    fn test_acquire_turns_weak_entry_strong() {
        let (cache, _) = cache_with_clock(0);
        let weak = cache.resolve("ORCL");
        let strong = cache.resolve_and_acquire("ORCL");
        assert!(Symbol::ptr_eq(&weak, &strong));
        assert_eq!(cache.clean_up(), 0);
    }

    #[test]
    fn test_release_without_acquire_is_noop() {
        let (cache, _) = cache_with_clock(0);
        // Not cached at all
        assert!(!cache.release("NOPE"));
        // Cached but weak
        cache.resolve("IBM");
        assert!(!cache.release("IBM"));
        assert_eq!(cache.ref_count("IBM"), 0);
        // Over-release after a balanced pair
        cache.resolve_and_acquire("IBM");
        assert!(cache.release("IBM"));
        assert!(!cache.release("IBM"));
        assert_eq!(cache.ref_count("IBM"), 0);
    }

    #[test]
    fn test_ttl_respects_idle_time() {
        let (cache, clock) = cache_with_clock(500);
        cache.resolve("IBM");
        clock.advance(499);
        assert_eq!(cache.clean_up(), 0);
        // A hit refreshes the timer
        cache.resolve("IBM");
        clock.advance(499);
        assert_eq!(cache.clean_up(), 0);
        clock.advance(1);
        assert_eq!(cache.clean_up(), 1);
    }

    #[test]
    fn test_get_if_present_does_not_refresh() {
        let (cache, clock) = cache_with_clock(100);
        cache.resolve("IBM");
        clock.advance(60);
        assert!(cache.get_if_present("IBM").is_some());
        clock.advance(40);
        assert_eq!(cache.clean_up(), 1);
    }

    #[test]
    fn test_get_if_present_does_not_insert() {
        let (cache, _) = cache_with_clock(0);
        assert!(cache.get_if_present("IBM").is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_release_restarts_timer() {
        let (cache, clock) = cache_with_clock(100);
        cache.resolve_and_acquire("IBM");
        clock.advance(1_000);
        cache.release("IBM");
        clock.advance(99);
        assert_eq!(cache.clean_up(), 0);
        clock.advance(1);
        assert_eq!(cache.clean_up(), 1);
    }

    #[test]
    fn test_evicted_symbol_is_recreated() {
        let (cache, _) = cache_with_clock(0);
        let first = cache.resolve("IBM");
        cache.clean_up();
        let second = cache.resolve("IBM");
        assert_eq!(first, second);
        assert!(!Symbol::ptr_eq(&first, &second));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_clear() {
        let (cache, _) = cache_with_clock(0);
        cache.resolve("A");
        cache.resolve_and_acquire("B");
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(!cache.release("B"));
    }

    #[test]
    fn test_builder_errors_are_distinct() {
        assert_eq!(
            SymbolCache::builder().with_ttl_millis(-1).build().unwrap_err(),
            CacheConfigError::InvalidTtl(-1)
        );
        assert_eq!(
            SymbolCache::builder().with_initial_capacity(-5).build().unwrap_err(),
            CacheConfigError::InvalidInitialCapacity(-5)
        );
        assert_eq!(
            SymbolCache::builder().with_sharding(-2).build().unwrap_err(),
            CacheConfigError::InvalidSharding(-2)
        );
        assert_eq!(
            SymbolCache::builder().with_clock(None).build().unwrap_err(),
            CacheConfigError::MissingClock
        );
    }

    #[test]
    fn test_builder_boundaries_are_accepted() {
        let cache = SymbolCache::builder()
            .with_ttl_millis(0)
            .with_initial_capacity(0)
            .with_sharding(0)
            .build()
            .unwrap();
        assert_eq!(cache.shard_count(), 1);
        assert_eq!(cache.ttl_millis(), 0);
    }

    #[test]
    fn test_sharding_rounds_to_power_of_two() {
        let shards = |n| SymbolCache::builder().with_sharding(n).build().unwrap().shard_count();
        assert_eq!(shards(1), 1);
        assert_eq!(shards(3), 4);
        assert_eq!(shards(16), 16);
        assert_eq!(shards(17), 32);
        assert_eq!(shards(1_000_000), MAX_SHARDS);
        assert_eq!(SymbolCache::builder().build().unwrap().shard_count(), 16);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            ttl_ms: 250,
            initial_capacity: 1024,
            sharding: 8,
        };
        let cache = SymbolCache::from_config(&config).unwrap();
        assert_eq!(cache.shard_count(), 8);
        assert_eq!(cache.ttl_millis(), 250);

        let bad = CacheConfig {
            ttl_ms: -10,
            ..config
        };
        assert_eq!(
            SymbolCache::from_config(&bad).unwrap_err(),
            CacheConfigError::InvalidTtl(-10)
        );
    }

    #[test]
    fn test_metrics() {
        let (cache, _) = cache_with_clock(0);
        cache.resolve("A");
        cache.resolve("A");
        cache.resolve("B");
        cache.clean_up();
        let m = cache.metrics();
        assert_eq!(m.misses, 2);
        assert_eq!(m.hits, 1);
        assert_eq!(m.evictions, 2);
    }

    #[test]
    fn test_concurrent_resolve_converges() {
        let cache = Arc::new(SymbolCache::builder().with_sharding(4).build().unwrap());
        let names: Vec<String> = (0..200).map(|i| format!("SYM{i}")).collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let names = names.clone();
                thread::spawn(move || {
                    let mut key = KeyBuffer::new();
                    names
                        .iter()
                        .enumerate()
                        .map(|(i, n)| {
                            if i % 2 == 0 {
                                cache.resolve(n)
                            } else {
                                cache.resolve_key(key.embed_str(n)).unwrap()
                            }
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<Symbol>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for per_thread in &results[1..] {
            for (a, b) in results[0].iter().zip(per_thread) {
                assert!(Symbol::ptr_eq(a, b));
            }
        }
        assert_eq!(cache.size(), 200);
    }

    #[test]
    fn test_clean_up_races_acquire() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(
            SymbolCache::builder()
                .with_ttl_millis(0)
                .with_sharding(2)
                .with_clock(Some(clock.clone()))
                .build()
                .unwrap(),
        );

        thread::scope(|scope| {
            let sweeper = {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for _ in 0..2_000 {
                        cache.clean_up();
                    }
                })
            };
            for round in 0..2_000 {
                let name = format!("S{}", round % 50);
                let s = cache.resolve_and_acquire(&name);
                // Held symbols can't be swept away
                let present = cache.get_if_present(&name).expect("acquired symbol evicted");
                assert!(Symbol::ptr_eq(&s, &present));
                assert!(cache.release(&name));
            }
            sweeper.join().unwrap();
        });

        cache.clean_up();
        assert_eq!(cache.size(), 0);
    }
}
