//! Hot path operations - bounded work per record
//!
//! This module contains latency-critical code:
//! - Paged history buffers (single writer, lock-free readers)
//! - Snapshots and ordered traversal
//! - Record routing from decoders to per-symbol streams

pub mod collector;
pub mod history_buffer;
pub mod history_page;
pub mod history_snapshot;

pub use collector::{Collector, CollectorError};
pub use history_buffer::{HistoryBuffer, HistoryStats, NoStats, PutOutcome, PutReport};
pub use history_page::{HistoryEntry, Page, DEFAULT_PAGE_CAPACITY, MIN_PAGE_CAPACITY};
pub use history_snapshot::{Direction, HistoryReader, HistorySnapshot, SnapshotIter};
