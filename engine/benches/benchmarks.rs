//! Performance benchmarks for ordo-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ordo_engine::{
    has_duplicate_positions, rewrite_base, Ack, AllowAll, CacheSnapshot, Container, Item, ItemId,
    ItemKind, ManualClock, MemoryStore, OrderCache, OrderingEngine, ReorderIntent, TargetIndex,
};
use std::sync::Arc;

fn item_ids(count: usize) -> Vec<ItemId> {
    (0..count).map(|i| format!("card_{i}")).collect()
}

fn items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| Item::new(format!("card_{i}"), ItemKind::Card, "col", i as i64 * 10, 0))
        .collect()
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("reorder_reverse", size), &size, |b, &size| {
            let mut cache = OrderCache::new();
            cache.replace("col", item_ids(size));
            let mut reversed = item_ids(size);
            reversed.reverse();

            b.iter(|| {
                let dispatch = cache
                    .apply(black_box(ReorderIntent::reorder("col", reversed.clone())))
                    .unwrap();
                cache.acknowledge(&dispatch, &Ok(Ack::default()))
            })
        });

        group.bench_with_input(BenchmarkId::new("move_round_trip", size), &size, |b, &size| {
            let mut cache = OrderCache::new();
            cache.replace("a", item_ids(size));
            cache.replace("b", Vec::new());

            b.iter(|| {
                cache
                    .apply(ReorderIntent::move_item("card_0", "a", "b", TargetIndex::At(0)))
                    .unwrap();
                cache
                    .apply(ReorderIntent::move_item("card_0", "b", "a", TargetIndex::At(0)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_positions(c: &mut Criterion) {
    let mut group = c.benchmark_group("positions");

    for size in [10, 100, 1000] {
        let siblings = items(size);

        group.bench_with_input(BenchmarkId::new("rewrite_base", size), &siblings, |b, siblings| {
            b.iter(|| rewrite_base(black_box(5_000), black_box(siblings)))
        });

        group.bench_with_input(
            BenchmarkId::new("has_duplicate_positions", size),
            &siblings,
            |b, siblings| b.iter(|| has_duplicate_positions(black_box(siblings))),
        );
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for size in [10, 100] {
        group.bench_with_input(BenchmarkId::new("reorder", size), &size, |b, &size| {
            let store = Arc::new(MemoryStore::with_unique_positions());
            store.add_container(Container::column("col")).unwrap();
            for item in items(size) {
                store.seed_item(item).unwrap();
            }
            let clock = Arc::new(ManualClock::new(1_000_000));
            let engine = OrderingEngine::builder(store, Arc::new(AllowAll))
                .clock(clock.clone())
                .build();
            let mut order = item_ids(size);
            order.reverse();

            b.iter(|| {
                clock.advance(1);
                runtime
                    .block_on(engine.reorder("bench", "col", black_box(&order)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    let mut cache = OrderCache::new();
    for column in 0..20 {
        cache.replace(format!("col_{column}"), item_ids(50));
    }

    group.bench_function("export_json", |b| {
        b.iter(|| CacheSnapshot::from_cache(black_box(&cache)).to_json().unwrap())
    });

    let json = CacheSnapshot::from_cache(&cache).to_json().unwrap();
    group.bench_function("import_json", |b| {
        b.iter(|| {
            CacheSnapshot::from_json(black_box(&json))
                .unwrap()
                .into_cache()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cache,
    bench_positions,
    bench_engine,
    bench_snapshot
);
criterion_main!(benches);
