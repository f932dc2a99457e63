//! Benchmarks for SymbolCache
//!
//! Target: <50ns per cache hit, no allocation on the key path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_qd::core::{KeyBuffer, SymbolCache};

fn warm_cache(symbols: &[String]) -> SymbolCache {
    let cache = SymbolCache::builder()
        .with_sharding(16)
        .build()
        .expect("valid cache configuration");
    for symbol in symbols {
        cache.resolve(symbol);
    }
    cache
}

fn symbols() -> Vec<String> {
    (0..1_000).map(|i| format!("SYM{i:04}.X")).collect()
}

fn bench_resolve(c: &mut Criterion) {
    let symbols = symbols();
    let cache = warm_cache(&symbols);

    c.bench_function("symbol_resolve_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % symbols.len();
            cache.resolve(black_box(&symbols[i]))
        })
    });

    let units: Vec<Vec<u16>> = symbols.iter().map(|s| s.encode_utf16().collect()).collect();
    let mut key = KeyBuffer::with_capacity(16);
    c.bench_function("symbol_resolve_key_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % units.len();
            cache.resolve_key(key.embed_units(black_box(&units[i])))
        })
    });

    c.bench_function("symbol_get_if_present_miss", |b| {
        b.iter(|| cache.get_if_present(black_box("ABSENT.X")))
    });
}

fn bench_acquire_release(c: &mut Criterion) {
    let symbols = symbols();
    let cache = warm_cache(&symbols);

    c.bench_function("symbol_acquire_release", |b| {
        b.iter(|| {
            let symbol = cache.resolve_and_acquire(black_box("SYM0500.X"));
            cache.release(&symbol)
        })
    });
}

fn bench_clean_up(c: &mut Criterion) {
    let symbols = symbols();
    let cache = warm_cache(&symbols);

    // Nothing is old enough, so each pass scans every entry and keeps it
    c.bench_function("symbol_clean_up_scan_1k", |b| b.iter(|| cache.clean_up()));
}

criterion_group!(benches, bench_resolve, bench_acquire_release, bench_clean_up);
criterion_main!(benches);
