//! One independently locked partition of the symbol cache
//!
//! Lookups take the shared lock and then work on the entry's atomic state word
//! with CAS, so hits never serialize. The exclusive lock is only taken when an
//! entry is missing or was already marked removed, and by the sweep that
//! purges removed entries.

use crate::core::clock::Clock;
use crate::core::key::{equals_with_key, string_from_key, KeyError};
use crate::core::Symbol;
use crate::infrastructure::metrics::CacheMetrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Set when the state holds an access time, clear when it holds a refcount
const TTL_BIT: u64 = 1 << 63;
/// Terminal state; the entry waits to be purged and can't be revived
const REMOVED: u64 = 0;

/// Cache entry with its lifecycle packed into one atomic word
///
/// * `REMOVED` (0): dead, only the sweep or a slow-path resolve touches it
/// * `TTL_BIT | time`: weak, unreferenced since `time`
/// * `n > 0`: strong, `n` outstanding acquisitions
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub(crate) symbol: Symbol,
    state: AtomicU64,
}

#[inline(always)]
fn weak_state(now: i64) -> u64 {
    TTL_BIT | (now.max(0) as u64 & !TTL_BIT)
}

impl CacheEntry {
    fn with_time(symbol: Symbol, now: i64) -> Self {
        Self {
            symbol,
            state: AtomicU64::new(weak_state(now)),
        }
    }

    fn with_counter(symbol: Symbol) -> Self {
        Self {
            symbol,
            state: AtomicU64::new(1),
        }
    }

    /// Try to increment the counter of a live entry
    pub(crate) fn increment_count(&self) -> bool {
        let mut s = self.state.load(Ordering::Acquire);
        loop {
            if s == REMOVED {
                return false;
            }
            let next = if s & TTL_BIT != 0 { 1 } else { s + 1 };
            match self
                .state
                .compare_exchange_weak(s, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => s = actual,
            }
        }
    }

    /// Try to decrement the counter of a strong entry; the last release starts
    /// the idle timer.
    pub(crate) fn decrement_count(&self, clock: &dyn Clock) -> bool {
        let mut now = None;
        let mut s = self.state.load(Ordering::Acquire);
        loop {
            if s & TTL_BIT != 0 || s == REMOVED {
                return false;
            }
            let next = if s == 1 {
                weak_state(*now.get_or_insert_with(|| clock.millis()))
            } else {
                s - 1
            };
            match self
                .state
                .compare_exchange_weak(s, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => s = actual,
            }
        }
    }

    /// Refresh the access time of a weak entry; strong entries need nothing.
    pub(crate) fn update_time(&self, clock: &dyn Clock) -> bool {
        let mut now = None;
        let mut s = self.state.load(Ordering::Acquire);
        loop {
            if s == REMOVED {
                return false;
            }
            if s & TTL_BIT == 0 {
                return true;
            }
            let next = weak_state(*now.get_or_insert_with(|| clock.millis()));
            // Never move the access time backwards
            if next <= s {
                return true;
            }
            match self
                .state
                .compare_exchange_weak(s, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => s = actual,
            }
        }
    }

    /// Move a weak entry idle since `expire_time` or earlier to `REMOVED`.
    ///
    /// The CAS fails if an acquire or a refresh slipped in, which keeps the
    /// entry alive.
    pub(crate) fn expire_if_needed(&self, expire_time: i64) -> bool {
        let s = self.state.load(Ordering::Acquire);
        if s == REMOVED || s & TTL_BIT == 0 {
            return false;
        }
        if (s & !TTL_BIT) as i64 > expire_time {
            return false;
        }
        self.state
            .compare_exchange(s, REMOVED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub(crate) fn is_removed(&self) -> bool {
        self.state.load(Ordering::Acquire) == REMOVED
    }

    /// Outstanding acquisitions (0 for weak or removed entries)
    #[inline]
    pub(crate) fn ref_count(&self) -> u64 {
        let s = self.state.load(Ordering::Acquire);
        if s & TTL_BIT != 0 {
            0
        } else {
            s
        }
    }
}

/// Lookup key: a plain string or an embedded key buffer
#[derive(Clone, Copy)]
pub(crate) enum Probe<'a> {
    Str(&'a str),
    Key(&'a [u16]),
}

impl Probe<'_> {
    #[inline]
    fn matches(&self, entry: &CacheEntry) -> bool {
        match *self {
            Probe::Str(s) => entry.symbol.as_str() == s,
            Probe::Key(chars) => equals_with_key(entry.symbol.as_str(), chars),
        }
    }
}

/// How a resolve retains the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retain {
    /// Refresh the idle timer
    Weak,
    /// Increment the reference count
    Strong,
}

#[derive(Debug, Default)]
struct ShardMap {
    buckets: HashMap<i32, Vec<CacheEntry>>,
    len: usize,
}

impl ShardMap {
    #[inline]
    fn find(&self, hash: i32, probe: Probe<'_>) -> Option<&CacheEntry> {
        self.buckets
            .get(&hash)
            .and_then(|bucket| bucket.iter().find(|e| probe.matches(e)))
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheShard {
    map: RwLock<ShardMap>,
    pub(crate) metrics: CacheMetrics,
}

impl CacheShard {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(ShardMap {
                buckets: HashMap::with_capacity(capacity),
                len: 0,
            }),
            metrics: CacheMetrics::new(),
        }
    }

    /// Resolve `symbol` to its canonical instance, inserting when absent
    pub(crate) fn resolve(&self, hash: i32, symbol: &str, retain: Retain, clock: &dyn Clock) -> Symbol {
        match self.retain_existing(hash, Probe::Str(symbol), retain, clock) {
            Some(found) => found,
            None => self.resolve_slow(hash, symbol, retain, clock),
        }
    }

    /// Resolve an embedded key; its content is decoded only on a miss and a
    /// key that fails to decode is never inserted
    pub(crate) fn resolve_key(
        &self,
        hash: i32,
        key: &[u16],
        retain: Retain,
        clock: &dyn Clock,
    ) -> Result<Symbol, KeyError> {
        if let Some(found) = self.retain_existing(hash, Probe::Key(key), retain, clock) {
            return Ok(found);
        }
        let symbol = string_from_key(key)?;
        Ok(self.resolve_slow(hash, &symbol, retain, clock))
    }

    /// Retain a live entry under the shared lock
    #[inline]
    fn retain_existing(&self, hash: i32, probe: Probe<'_>, retain: Retain, clock: &dyn Clock) -> Option<Symbol> {
        let map = self.map.read();
        let entry = map.find(hash, probe)?;
        let retained = match retain {
            Retain::Weak => entry.update_time(clock),
            Retain::Strong => entry.increment_count(),
        };
        if !retained {
            // Removed: settle it under the exclusive lock
            return None;
        }
        self.metrics.record_hit();
        Some(entry.symbol.clone())
    }

    #[cold]
    fn resolve_slow(&self, hash: i32, symbol: &str, retain: Retain, clock: &dyn Clock) -> Symbol {
        let probe = Probe::Str(symbol);
        let mut map = self.map.write();
        let ShardMap { buckets, len } = &mut *map;
        let bucket = buckets.entry(hash).or_default();
        if let Some(pos) = bucket.iter().position(|e| probe.matches(e)) {
            let retained = match retain {
                Retain::Weak => bucket[pos].update_time(clock),
                Retain::Strong => bucket[pos].increment_count(),
            };
            if retained {
                // Another thread created it between our two lock acquisitions
                self.metrics.record_hit();
                return bucket[pos].symbol.clone();
            }
            bucket.swap_remove(pos);
            *len -= 1;
        }
        let symbol = Symbol::new(symbol);
        let entry = match retain {
            Retain::Weak => CacheEntry::with_time(symbol.clone(), clock.millis()),
            Retain::Strong => CacheEntry::with_counter(symbol.clone()),
        };
        bucket.push(entry);
        *len += 1;
        self.metrics.record_miss();
        symbol
    }

    pub(crate) fn get_if_present(&self, hash: i32, probe: Probe<'_>) -> Option<Symbol> {
        let map = self.map.read();
        map.find(hash, probe)
            .filter(|e| !e.is_removed())
            .map(|e| e.symbol.clone())
    }

    pub(crate) fn release(&self, hash: i32, probe: Probe<'_>, clock: &dyn Clock) -> bool {
        let map = self.map.read();
        map.find(hash, probe)
            .map(|e| e.decrement_count(clock))
            .unwrap_or(false)
    }

    pub(crate) fn ref_count(&self, hash: i32, probe: Probe<'_>) -> u64 {
        let map = self.map.read();
        map.find(hash, probe).map(CacheEntry::ref_count).unwrap_or(0)
    }

    /// Expire idle weak entries and purge everything marked removed.
    ///
    /// Expiry runs under the shared lock; the exclusive lock is taken only
    /// when there is something to purge.
    pub(crate) fn clean_up(&self, expire_time: i64) -> usize {
        let mut dead = 0;
        {
            let map = self.map.read();
            for entry in map.buckets.values().flatten() {
                if entry.expire_if_needed(expire_time) || entry.is_removed() {
                    dead += 1;
                }
            }
        }
        if dead == 0 {
            return 0;
        }
        let mut map = self.map.write();
        let ShardMap { buckets, len } = &mut *map;
        let before = *len;
        buckets.retain(|_, bucket| {
            bucket.retain(|e| !e.is_removed());
            !bucket.is_empty()
        });
        *len = buckets.values().map(Vec::len).sum();
        let evicted = before - *len;
        self.metrics.record_evictions(evicted as u64);
        evicted
    }

    pub(crate) fn clear(&self) {
        let mut map = self.map.write();
        map.buckets.clear();
        map.len = 0;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.read().len
    }
}
