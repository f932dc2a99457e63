//! Core types shared by decoders and storage
//!
//! This module contains the fundamental types used throughout the system:
//! - Symbol: canonical, reference-comparable symbol handle
//! - SymbolCache: sharded, reference-counted, TTL-evicted symbol pool
//! - key: embedded key header convention for allocation-free probing
//! - record: record layouts, event flags and the cursor capability

mod cache_shard;
pub mod clock;
pub mod key;
pub mod record;
pub mod symbol;
pub mod symbol_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{KeyBuffer, KeyError, KEY_HEADER_SIZE, KEY_MAGIC0, KEY_MAGIC1};
pub use record::{EventFlags, ObjValue, RecordCursor, RecordLayout, RecordValues};
pub use symbol::Symbol;
pub use symbol_cache::{CacheConfigError, SymbolCache, SymbolCacheBuilder};
