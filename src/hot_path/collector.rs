//! Stream collector
//!
//! Routes decoded records to one history buffer per (record, symbol) pair.
//! Symbols are resolved through the shared [`SymbolCache`]; a stream holds
//! an acquired reference on its symbol for as long as it is open, so the
//! cache never evicts a symbol that still has history.

use crate::core::record::{RecordCursor, RecordLayout};
use crate::core::{KeyBuffer, KeyError, Symbol, SymbolCache};
use crate::hot_path::history_buffer::{HistoryBuffer, HistoryStats, PutOutcome, PutReport};
use crate::hot_path::history_snapshot::HistoryReader;
use crate::infrastructure::config::HistoryConfig;
use crate::infrastructure::metrics::HistoryCounters;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::Level;

/// Collector routing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("Unknown record id {0}")]
    UnknownRecord(u32),

    #[error("Record id {0} is already registered")]
    DuplicateRecord(u32),

    #[error("Invalid symbol key: {0}")]
    InvalidKey(#[from] KeyError),
}

/// Open streams of one record type
struct RecordStreams {
    layout: Arc<RecordLayout>,
    streams: HashMap<Symbol, HistoryBuffer>,
}

/// Single-writer router from decoded records to history buffers
pub struct Collector {
    cache: Arc<SymbolCache>,
    stats: Arc<HistoryCounters>,
    config: HistoryConfig,
    records: HashMap<u32, RecordStreams>,
    /// Reused for every symbol read off the wire
    key: KeyBuffer,
}

impl Collector {
    pub fn new(cache: Arc<SymbolCache>, stats: Arc<HistoryCounters>, config: HistoryConfig) -> Self {
        Self {
            cache,
            stats,
            config,
            records: HashMap::new(),
            key: KeyBuffer::new(),
        }
    }

    /// Register a record layout; its id routes records afterwards
    pub fn register_record(&mut self, layout: RecordLayout) -> Result<Arc<RecordLayout>, CollectorError> {
        match self.records.entry(layout.id) {
            Entry::Occupied(_) => Err(CollectorError::DuplicateRecord(layout.id)),
            Entry::Vacant(slot) => {
                let layout = Arc::new(layout);
                slot.insert(RecordStreams {
                    layout: Arc::clone(&layout),
                    streams: HashMap::new(),
                });
                crate::log_collector!(Level::INFO, record = %layout.name, id = layout.id, "record registered");
                Ok(layout)
            }
        }
    }

    /// Route a record whose symbol arrives as raw UTF-16 units
    ///
    /// The symbol is embedded into a reused key buffer, so known symbols
    /// resolve without allocating. Units that don't decode as UTF-16 fail
    /// with [`CollectorError::InvalidKey`] and open no stream.
    pub fn process_units<C>(
        &mut self,
        record_id: u32,
        symbol_units: &[u16],
        index: i64,
        cursor: &C,
        is_snapshot: bool,
    ) -> Result<PutOutcome, CollectorError>
    where
        C: RecordCursor + ?Sized,
    {
        let symbol = self.cache.resolve_key(self.key.embed_units(symbol_units))?;
        self.route(record_id, symbol, index, cursor, is_snapshot)
    }

    /// Route a record for a symbol given as text
    pub fn process<C>(
        &mut self,
        record_id: u32,
        symbol: &str,
        index: i64,
        cursor: &C,
        is_snapshot: bool,
    ) -> Result<PutOutcome, CollectorError>
    where
        C: RecordCursor + ?Sized,
    {
        let symbol = self.cache.resolve(symbol);
        self.route(record_id, symbol, index, cursor, is_snapshot)
    }

    fn route<C>(
        &mut self,
        record_id: u32,
        symbol: Symbol,
        index: i64,
        cursor: &C,
        is_snapshot: bool,
    ) -> Result<PutOutcome, CollectorError>
    where
        C: RecordCursor + ?Sized,
    {
        let records = self
            .records
            .get_mut(&record_id)
            .ok_or(CollectorError::UnknownRecord(record_id))?;
        let flags = cursor.get_event_flags();

        if let Some(buffer) = records.streams.get_mut(&symbol) {
            return Ok(Self::apply(buffer, self.config, &self.stats, index, cursor, is_snapshot));
        }
        if flags.is_remove() {
            // Nothing to remove from a stream that never existed
            self.stats.record_put(&PutReport {
                record_id,
                outcome: PutOutcome::Ignored,
                is_snapshot,
                bytes: records.layout.record_bytes(),
            });
            return Ok(PutOutcome::Ignored);
        }

        // A sweep may have evicted the resolved instance since; the stream is
        // keyed by the acquired one, which stays canonical while it is open.
        let symbol = self.cache.resolve_and_acquire(&symbol);
        crate::log_collector!(Level::DEBUG, record = %records.layout.name, symbol = %symbol, "stream opened");
        let layout = Arc::clone(&records.layout);
        let page_capacity = self.config.page_capacity;
        let buffer = records
            .streams
            .entry(symbol)
            .or_insert_with(|| HistoryBuffer::with_page_capacity(layout, page_capacity));
        Ok(Self::apply(buffer, self.config, &self.stats, index, cursor, is_snapshot))
    }

    fn apply<C>(
        buffer: &mut HistoryBuffer,
        config: HistoryConfig,
        stats: &HistoryCounters,
        index: i64,
        cursor: &C,
        is_snapshot: bool,
    ) -> PutOutcome
    where
        C: RecordCursor + ?Sized,
    {
        let outcome = buffer.put_record(index, cursor, is_snapshot, stats, cursor.get_event_flags());
        if config.max_record_count > 0 {
            buffer.enforce_max_record_count(config.max_record_count, stats);
        }
        outcome
    }

    /// Close one stream, dropping its history and releasing its symbol
    pub fn close_stream(&mut self, record_id: u32, symbol: &str) -> bool {
        let Some(records) = self.records.get_mut(&record_id) else {
            return false;
        };
        match records.streams.remove_entry(symbol) {
            Some((symbol, mut buffer)) => {
                buffer.clear_all_records(&*self.stats);
                self.cache.release(&symbol);
                crate::log_collector!(Level::DEBUG, record = %records.layout.name, symbol = %symbol, "stream closed");
                true
            }
            None => false,
        }
    }

    /// Close every stream; returns how many were open
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for records in self.records.values_mut() {
            for (symbol, mut buffer) in records.streams.drain() {
                buffer.clear_all_records(&*self.stats);
                self.cache.release(&symbol);
                closed += 1;
            }
        }
        if closed > 0 {
            crate::log_collector!(Level::INFO, closed, "all streams closed");
        }
        closed
    }

    /// Reader for one stream, if open
    pub fn reader(&self, record_id: u32, symbol: &str) -> Option<HistoryReader> {
        self.buffer(record_id, symbol).map(HistoryBuffer::reader)
    }

    pub fn buffer(&self, record_id: u32, symbol: &str) -> Option<&HistoryBuffer> {
        self.records.get(&record_id)?.streams.get(symbol)
    }

    /// Number of open streams across all records
    pub fn stream_count(&self) -> usize {
        self.records.values().map(|r| r.streams.len()).sum()
    }

    #[inline]
    pub fn cache(&self) -> &Arc<SymbolCache> {
        &self.cache
    }

    #[inline]
    pub fn stats(&self) -> &Arc<HistoryCounters> {
        &self.stats
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.close_all();
    }
}
