//! Metrics collection for the storage core
//!
//! Lock-free counters using atomic operations.
//! Updated on the hot path, read as snapshots on the cold path.

use crate::hot_path::history_buffer::{HistoryStats, PutOutcome, PutReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Per-shard symbol cache counters
#[derive(Debug)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Cache counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Lookup served by an existing entry
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookup that had to create an entry
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMetricsSnapshot {
    /// Sum of two snapshots (used to aggregate shards)
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
        }
    }

    /// Fraction of lookups served without creating an entry
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// History buffer counters, shared by every buffer of a collector
///
/// Implements [`HistoryStats`] so it can be handed straight to
/// `put_record` and the maintenance operations.
pub struct HistoryCounters {
    added: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
    removed: AtomicU64,
    ignored: AtomicU64,
    snapshot_puts: AtomicU64,
    /// Entries dropped by retention and clearing
    trimmed: AtomicU64,
    /// Bytes of records currently stored
    stored_bytes: AtomicU64,
    start_time: Instant,
}

/// History counters at one point in time
#[derive(Debug, Clone, Copy, Default)]
pub struct HistorySnapshotMetrics {
    pub added: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
    pub ignored: u64,
    pub snapshot_puts: u64,
    pub trimmed: u64,
    pub stored_bytes: u64,
    pub put_rate: f64, // puts per second
    pub uptime_seconds: u64,
}

impl HistoryCounters {
    pub fn new() -> Self {
        Self {
            added: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            snapshot_puts: AtomicU64::new(0),
            trimmed: AtomicU64::new(0),
            stored_bytes: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> HistorySnapshotMetrics {
        let added = self.added.load(Ordering::Relaxed);
        let updated = self.updated.load(Ordering::Relaxed);
        let unchanged = self.unchanged.load(Ordering::Relaxed);
        let removed = self.removed.load(Ordering::Relaxed);
        let ignored = self.ignored.load(Ordering::Relaxed);
        let total = added + updated + unchanged + removed + ignored;

        let elapsed = self.start_time.elapsed();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            total as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        HistorySnapshotMetrics {
            added,
            updated,
            unchanged,
            removed,
            ignored,
            snapshot_puts: self.snapshot_puts.load(Ordering::Relaxed),
            trimmed: self.trimmed.load(Ordering::Relaxed),
            stored_bytes: self.stored_bytes.load(Ordering::Relaxed),
            put_rate: rate,
            uptime_seconds: elapsed.as_secs(),
        }
    }

    #[inline]
    fn release_bytes(&self, bytes: u64) {
        let _ = self
            .stored_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes))
            });
    }
}

impl Default for HistoryCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStats for HistoryCounters {
    #[inline]
    fn record_put(&self, report: &PutReport) {
        let counter = match report.outcome {
            PutOutcome::Added => &self.added,
            PutOutcome::Updated => &self.updated,
            PutOutcome::Unchanged => &self.unchanged,
            PutOutcome::Removed => &self.removed,
            PutOutcome::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if report.is_snapshot {
            self.snapshot_puts.fetch_add(1, Ordering::Relaxed);
        }
        match report.outcome.size_delta() {
            1 => {
                self.stored_bytes.fetch_add(report.bytes as u64, Ordering::Relaxed);
            }
            -1 => self.release_bytes(report.bytes as u64),
            _ => {}
        }
    }

    fn record_removed(&self, _record_id: u32, count: usize, bytes: usize) {
        self.trimmed.fetch_add(count as u64, Ordering::Relaxed);
        self.release_bytes((count * bytes) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: PutOutcome, is_snapshot: bool) -> PutReport {
        PutReport {
            record_id: 3,
            outcome,
            is_snapshot,
            bytes: 24,
        }
    }

    #[test]
    fn test_cache_metrics() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_evictions(0);
        metrics.record_evictions(5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.evictions, 5);
        assert!((snapshot.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_snapshot_merge() {
        let a = CacheMetricsSnapshot {
            hits: 1,
            misses: 2,
            evictions: 3,
        };
        let b = CacheMetricsSnapshot {
            hits: 10,
            misses: 20,
            evictions: 30,
        };
        let merged = a.merge(&b);
        assert_eq!(merged.hits, 11);
        assert_eq!(merged.misses, 22);
        assert_eq!(merged.evictions, 33);
        assert_eq!(CacheMetricsSnapshot::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_history_counters() {
        let counters = HistoryCounters::new();
        counters.record_put(&report(PutOutcome::Added, true));
        counters.record_put(&report(PutOutcome::Added, false));
        counters.record_put(&report(PutOutcome::Updated, false));
        counters.record_put(&report(PutOutcome::Removed, false));
        counters.record_put(&report(PutOutcome::Ignored, true));

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.added, 2);
        assert_eq!(snapshot.updated, 1);
        assert_eq!(snapshot.removed, 1);
        assert_eq!(snapshot.ignored, 1);
        assert_eq!(snapshot.unchanged, 0);
        assert_eq!(snapshot.snapshot_puts, 2);
        assert_eq!(snapshot.stored_bytes, 24);
        assert!(snapshot.put_rate >= 0.0);
    }

    #[test]
    fn test_history_counters_trim() {
        let counters = HistoryCounters::new();
        for _ in 0..4 {
            counters.record_put(&report(PutOutcome::Added, false));
        }
        counters.record_removed(3, 3, 24);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.trimmed, 3);
        assert_eq!(snapshot.stored_bytes, 24);
    }
}
