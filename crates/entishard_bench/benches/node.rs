//! Node round-trip benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use entishard_bench::bench_schema;
use entishard_codec::{NList, Nuid};
use entishard_core::{Cluster, Config, Schema};
use tokio::runtime::Runtime;

fn cluster(rt: &Runtime) -> (Cluster, Nuid) {
    let schema = Schema::clone(&bench_schema());
    let cluster = Cluster::builder(Config::default(), schema).build().unwrap();
    let id = Nuid::new(1, 1);
    rt.block_on(cluster.call(1, move |node| node.create(id, "player", NList::new())))
        .unwrap();
    (cluster, id)
}

/// Benchmark a field write on the owning node against one forwarded from
/// another node.
fn bench_set_field(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (cluster, id) = cluster(&rt);
    let mut group = c.benchmark_group("node_set_field");
    let mut level = 0;

    group.bench_function("local", |b| {
        b.to_async(&rt).iter(|| {
            level += 1;
            let value = level;
            let cluster = cluster.clone();
            async move {
                let changed = cluster
                    .call(1, move |node| node.set_field(id, "level", value))
                    .await
                    .unwrap();
                black_box(changed);
            }
        });
    });

    group.bench_function("forwarded", |b| {
        b.to_async(&rt).iter(|| {
            level += 1;
            let value = level;
            let cluster = cluster.clone();
            async move {
                let changed = cluster
                    .call(2, move |node| node.set_field(id, "level", value))
                    .await
                    .unwrap();
                black_box(changed);
            }
        });
    });

    group.finish();
    rt.block_on(cluster.shutdown());
}

criterion_group!(benches, bench_set_field);
criterion_main!(benches);
