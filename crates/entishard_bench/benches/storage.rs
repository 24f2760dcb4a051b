//! Cold storage benchmarks: bulk transactions against the in-memory cache.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entishard_bench::{bench_schema, generate_players};
use entishard_core::{CacheAdapter, EntityStorage};
use entishard_storage::InMemoryCache;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Benchmark writing a whole shard in one transaction.
fn bench_bulk_save(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache_bulk_save");
    group.sample_size(30);

    for count in [10, 100, 1000].iter() {
        let players = rt.block_on(generate_players(7, *count, 8));
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &players, |b, players| {
            let adapter = CacheAdapter::new(7, Arc::new(InMemoryCache::default()), bench_schema());
            b.to_async(&rt).iter(|| async {
                adapter.set_entities(black_box(players)).await.unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark reading a whole shard back with one pipelined transaction.
fn bench_bulk_load(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache_bulk_load");
    group.sample_size(30);

    for count in [10, 100, 1000].iter() {
        let players = rt.block_on(generate_players(7, *count, 8));
        let adapter = CacheAdapter::new(7, Arc::new(InMemoryCache::default()), bench_schema());
        rt.block_on(adapter.set_entities(&players)).unwrap();

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &adapter, |b, adapter| {
            b.to_async(&rt).iter(|| async {
                let entities = adapter.entities().await.unwrap();
                black_box(entities);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bulk_save, bench_bulk_load);
criterion_main!(benches);
