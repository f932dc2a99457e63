//! Replay driver for the per-symbol storage core
//!
//! # Architecture
//! - **core**: symbols, the symbol cache and the record model
//! - **hot_path**: history buffers, snapshots and the collector
//! - **infrastructure**: cold path (logging, metrics, config, pools, feeds)
//!
//! Feeds a synthetic trade stream through the collector in every supported
//! arrival order, then reports buffer shape and counters.

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_qd::core::record::{EventFlags, RecordLayout, RecordValues};
use rust_qd::core::SymbolCache;
use rust_qd::hot_path::Collector;
use rust_qd::infrastructure::config::Config;
use rust_qd::infrastructure::logging::init_logging;
use rust_qd::infrastructure::metrics::HistoryCounters;
use rust_qd::infrastructure::pool::KeyBufferPool;
use rust_qd::infrastructure::replay::AccessPattern;
use rust_qd::log_main;
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

const TRADE: u32 = 0;

/// Price and size fields derived from the feed position
fn trade(position: usize, index: i64) -> RecordValues {
    RecordValues::new(vec![position as i32, (index >> 32) as i32], Vec::new())
}

fn replay_patterns(collector: &mut Collector, config: &Config) -> anyhow::Result<Vec<String>> {
    let mut symbols = Vec::new();
    for pattern in AccessPattern::ALL {
        let symbol = format!("{}.REPLAY", pattern.name().to_uppercase());
        let units: Vec<u16> = symbol.encode_utf16().collect();
        let order = pattern.indices(config.replay.record_count, config.replay.seed);

        let started = Instant::now();
        for (position, &index) in order.iter().enumerate() {
            collector.process_units(TRADE, &units, index, &trade(position, index), false)?;
        }
        let elapsed = started.elapsed();

        let buffer = collector
            .buffer(TRADE, &symbol)
            .with_context(|| format!("no stream for {symbol}"))?;
        anyhow::ensure!(buffer.check_invariants(), "{pattern}: buffer structure broken");
        log_main!(
            Level::INFO,
            pattern = %pattern,
            records = buffer.len(),
            pages = buffer.page_count(),
            elapsed_us = elapsed.as_micros() as u64,
            "pattern replayed"
        );
        symbols.push(symbol);
    }
    Ok(symbols)
}

/// Random arrivals interleaved with removals of already stored records
fn replay_churn(collector: &mut Collector, config: &Config) -> anyhow::Result<String> {
    let symbol = String::from("CHURN.REPLAY");
    let mut rng = StdRng::seed_from_u64(config.replay.seed);
    let order = AccessPattern::Random.indices(config.replay.record_count, config.replay.seed);
    let mut stored = Vec::with_capacity(order.len());
    let mut removals = 0usize;

    for (position, &index) in order.iter().enumerate() {
        collector.process(TRADE, &symbol, index, &trade(position, index), false)?;
        stored.push(index);
        if rng.gen_bool(0.3) {
            let victim = stored.swap_remove(rng.gen_range(0..stored.len()));
            let removal = RecordValues::default().with_flags(EventFlags::REMOVE_EVENT);
            collector.process(TRADE, &symbol, victim, &removal, false)?;
            removals += 1;
        }
    }

    let buffer = collector
        .buffer(TRADE, &symbol)
        .with_context(|| format!("no stream for {symbol}"))?;
    anyhow::ensure!(buffer.len() == stored.len(), "churn: record count drifted");
    anyhow::ensure!(buffer.check_invariants(), "churn: buffer structure broken");
    log_main!(
        Level::INFO,
        records = buffer.len(),
        removals,
        pages = buffer.page_count(),
        "churn replayed"
    );
    Ok(symbol)
}

/// Logging, then config (or defaults)
fn start() -> rust_qd::Result<(Vec<WorkerGuard>, Config)> {
    let guards = init_logging()?;
    let config = Config::load()?;
    Ok((guards, config))
}

fn build_collector(config: &Config) -> rust_qd::Result<Collector> {
    let cache = Arc::new(SymbolCache::from_config(&config.cache)?);
    let mut collector = Collector::new(cache, Arc::new(HistoryCounters::new()), config.history);
    collector.register_record(RecordLayout::new(TRADE, "Trade", 2, 0))?;
    Ok(collector)
}

fn main() -> anyhow::Result<()> {
    let (_guards, config) = start().context("startup failed")?;
    log_main!(Level::INFO, ?config, "starting replay");

    let mut collector = build_collector(&config).context("invalid storage configuration")?;
    let cache = Arc::clone(collector.cache());
    let counters = Arc::clone(collector.stats());

    let mut symbols = replay_patterns(&mut collector, &config)?;
    symbols.push(replay_churn(&mut collector, &config)?);

    // Every open stream keeps its symbol cached; check through pooled key buffers
    let pool = KeyBufferPool::with_key_capacity(4, 32);
    for symbol in &symbols {
        let cached = pool.with_key(symbol, |key| cache.get_key_if_present(key).is_some());
        anyhow::ensure!(cached, "{symbol} missing from the symbol cache");
    }

    let history = counters.snapshot();
    log_main!(
        Level::INFO,
        added = history.added,
        updated = history.updated,
        removed = history.removed,
        ignored = history.ignored,
        trimmed = history.trimmed,
        stored_bytes = history.stored_bytes,
        put_rate = history.put_rate,
        "history counters"
    );

    let closed = collector.close_all();
    let evicted = cache.clean_up();
    let metrics = cache.metrics();
    log_main!(
        Level::INFO,
        closed,
        evicted,
        hits = metrics.hits,
        misses = metrics.misses,
        hit_ratio = metrics.hit_ratio(),
        "replay finished"
    );

    Ok(())
}
