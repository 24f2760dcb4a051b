//! Snapshot benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entishard_bench::{bench_schema, generate_players};
use entishard_core::{PersistenceAdapter, ShardDocument, StorageMode};
use entishard_storage::InMemoryDocumentStore;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn adapter() -> PersistenceAdapter {
    PersistenceAdapter::new(Arc::new(InMemoryDocumentStore::new()), bench_schema())
}

/// Benchmark building and encoding a shard document.
fn bench_snapshot_encode(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let persistence = adapter();
    let mut group = c.benchmark_group("snapshot_encode");

    for count in [10, 100, 1000].iter() {
        let players = rt.block_on(generate_players(3, *count, 8));
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &players, |b, players| {
            b.iter(|| {
                let doc = ShardDocument {
                    origin: 3,
                    storage_mode: StorageMode::Hot,
                    entities: players.iter().filter_map(|p| persistence.snapshot(p)).collect(),
                };
                black_box(doc.encode().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark decoding and restoring a shard document.
fn bench_snapshot_restore(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let persistence = adapter();
    let mut group = c.benchmark_group("snapshot_restore");

    for count in [10, 100, 1000].iter() {
        let players = rt.block_on(generate_players(3, *count, 8));
        let bytes = ShardDocument {
            origin: 3,
            storage_mode: StorageMode::Hot,
            entities: players.iter().filter_map(|p| persistence.snapshot(p)).collect(),
        }
        .encode()
        .unwrap();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| {
                let doc = ShardDocument::decode(black_box(bytes)).unwrap();
                black_box(persistence.restore_all(&doc));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_snapshot_encode, bench_snapshot_restore);
criterion_main!(benches);
