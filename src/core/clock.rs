//! Millisecond clocks for cache eviction timers
//!
//! The cache only needs a monotonic-enough millisecond counter. Wall clock
//! adjustments are tolerated: a backwards step merely delays eviction.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in milliseconds
pub trait Clock: Send + Sync {
    fn millis(&self) -> i64;
}

/// Wall clock (milliseconds since Unix epoch)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock forward and return the new time
    pub fn advance(&self, millis: i64) -> i64 {
        self.now.fetch_add(millis, Ordering::AcqRel) + millis
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn millis(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }
}
