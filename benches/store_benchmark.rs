//! Performance benchmarks for expense-cache
//!
//! This benchmark suite measures:
//! - Warm read path (cache hit, no network)
//! - Snapshot peeks
//! - Invalidate-and-refetch round trips against the in-memory API
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, Criterion};
use expense_cache::{Category, Expense, ExpenseStore, InMemoryApi, QueryKey, Tag};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn seeded_api(count: usize) -> InMemoryApi {
    let api = InMemoryApi::new();
    for i in 0..count {
        api.seed(Expense {
            id: format!("exp_{}", i),
            description: format!("Expense number {}", i),
            amount: 10.0 + i as f64,
            category: Category::ALL[i % Category::ALL.len()],
            created_at: "2024-01-03T10:00:00Z".to_string(),
            updated_at: "2024-01-03T10:00:00Z".to_string(),
        });
    }
    api
}

fn bench_warm_read(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to build runtime");
    let store = ExpenseStore::new(seeded_api(100));

    // Pre-warm the list entry so the benchmark measures pure hits.
    rt.block_on(async {
        let mut query = store.query(QueryKey::list());
        query.settled().await;
    });

    c.bench_function("store_warm_read", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(store.read(QueryKey::list())) });
    });

    c.bench_function("store_snapshot_peek", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(store.snapshot(&QueryKey::list())) });
    });
}

fn bench_invalidate_and_refetch(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to build runtime");
    let store = ExpenseStore::new(seeded_api(100));

    rt.block_on(async {
        let mut query = store.query(QueryKey::list());
        query.settled().await;
    });

    c.bench_function("invalidate_and_refetch", |b| {
        b.to_async(&rt).iter(|| async {
            let mut query = store.query(QueryKey::list());
            store.invalidate(&[Tag::Expenses]);
            black_box(query.settled().await)
        });
    });
}

criterion_group!(benches, bench_warm_read, bench_invalidate_and_refetch);
criterion_main!(benches);
