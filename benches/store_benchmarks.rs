// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for KVault stores

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use kvault_store::{DiskStore, JsonSerializer, MemoryStore, SerializedStore, Store};

/// A populated store of each backend. The TempDir must outlive the disk store.
fn stores(entries: usize) -> (Vec<Arc<dyn Store>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let memory: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let disk: Arc<dyn Store> = Arc::new(DiskStore::with_path(dir.path().join("bench.kv")));

    for store in [&memory, &disk] {
        for i in 0..entries {
            store
                .set(&format!("key-{i}"), format!("value-{i}").into())
                .unwrap();
        }
        for i in 0..entries / 10 {
            store
                .set(&format!("prefix-{i}"), format!("value-{i}").into())
                .unwrap();
        }
    }

    (vec![memory, disk], dir)
}

// ============================================================================
// Point operations
// ============================================================================

fn bench_get(c: &mut Criterion) {
    let (stores, _dir) = stores(1000);
    let mut group = c.benchmark_group("get");

    for store in &stores {
        group.bench_function(store.name(), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                black_box(store.get(&format!("key-{}", i % 1000)).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let (stores, _dir) = stores(0);
    let mut group = c.benchmark_group("set");

    for store in &stores {
        group.bench_function(store.name(), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                store
                    .set(&format!("key-{i}"), format!("value-{i}").into())
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete");

    for size in [10usize, 100, 1000] {
        let (stores, _dir) = stores(size);
        for store in &stores {
            group.bench_with_input(BenchmarkId::new(store.name(), size), &size, |b, &size| {
                let mut i = 0usize;
                b.iter(|| {
                    i += 1;
                    let key = format!("key-{}", i % size);
                    store.delete(&key).unwrap();
                    store.set(&key, "value".into()).unwrap();
                });
            });
        }
    }

    group.finish();
}

fn bench_exists(c: &mut Criterion) {
    let (stores, _dir) = stores(1000);
    let mut group = c.benchmark_group("exists");

    for store in &stores {
        group.bench_function(store.name(), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                black_box(store.exists(&format!("key-{}", i % 1000)).unwrap())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Listing
// ============================================================================

fn bench_list(c: &mut Criterion) {
    let (stores, _dir) = stores(1000);
    let mut group = c.benchmark_group("list");

    let cases: [(&str, &str, i64); 4] = [
        ("all", "", 0),
        ("prefix", "prefix", 0),
        ("limit", "", 10),
        ("prefix_limit", "prefix", 10),
    ];

    for store in &stores {
        for (label, prefix, limit) in cases {
            group.bench_function(BenchmarkId::new(store.name(), label), |b| {
                b.iter(|| black_box(store.list(prefix, limit).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_serialized_list(c: &mut Criterion) {
    let (stores, _dir) = stores(0);
    let mut group = c.benchmark_group("serialized_list");

    for backend in stores {
        let name = backend.name().to_string();
        let store = SerializedStore::new(backend, Arc::new(JsonSerializer::new()));
        for i in 0..500 {
            store
                .set_value(&format!("doc-{i:04}"), &serde_json::json!({"id": i, "tags": ["a", "b"]}))
                .unwrap();
        }
        group.bench_function(name, |b| {
            b.iter(|| black_box(store.list_values("doc-", 0).unwrap()));
        });
    }

    group.finish();
}

// ============================================================================
// Concurrency
// ============================================================================

fn bench_concurrent(c: &mut Criterion) {
    let (stores, _dir) = stores(1000);
    let mut group = c.benchmark_group("concurrent_get_set");

    for store in &stores {
        group.bench_function(store.name(), |b| {
            b.iter(|| {
                std::thread::scope(|scope| {
                    for worker in 0..4 {
                        let store = store.as_ref();
                        scope.spawn(move || {
                            for i in 0..50 {
                                let key = format!("key-{}", (worker * 50 + i) % 1000);
                                if i % 2 == 0 {
                                    black_box(store.get(&key).unwrap());
                                } else {
                                    store.set(&key, "value".into()).unwrap();
                                }
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get,
    bench_set,
    bench_delete,
    bench_exists,
    bench_list,
    bench_serialized_list,
    bench_concurrent,
);
criterion_main!(benches);
