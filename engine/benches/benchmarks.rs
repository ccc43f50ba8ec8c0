//! Performance benchmarks for tablesync-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use tablesync_engine::{Fields, MemoryAdapter, Query, Record, TableIndex, TableSync};

fn record(i: usize) -> Record {
    let mut fields = Fields::new();
    fields.insert("text".into(), json!(format!("item {i}")));
    fields.insert("n".into(), json!(i % 100));
    fields.insert("completed".into(), json!(i % 3 == 0));
    Record::new(format!("r{i}"), fields)
}

fn records(n: usize) -> Vec<Record> {
    (0..n).map(record).collect()
}

fn bench_index_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_operations");

    group.bench_function("set_one", |b| {
        let index = TableIndex::new("todos", records(1000));
        let mut i = 0usize;
        b.iter(|| {
            i += 1;
            index.set([black_box(record(i % 2000))])
        })
    });

    group.bench_function("set_identical_noop", |b| {
        let index = TableIndex::new("todos", records(1000));
        let same = record(10);
        b.iter(|| index.set([black_box(same.clone())]))
    });

    group.bench_function("unset_missing_noop", |b| {
        let index = TableIndex::new("todos", records(1000));
        b.iter(|| index.unset([black_box("nope")]))
    });

    group.bench_function("get", |b| {
        let index = TableIndex::new("todos", records(1000));
        b.iter(|| index.get(black_box("r500")))
    });

    group.finish();
}

fn bench_list_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_merge");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("set_many", size), size, |b, &size| {
            let batch = records(size);
            b.iter(|| {
                let index = TableIndex::empty("todos");
                index.set(black_box(batch.clone()))
            })
        });
    }

    group.finish();
}

fn bench_query_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_apply");

    let query = Query::new()
        .eq("completed", false)
        .gte("n", 10)
        .sort_asc("text")
        .skip(5)
        .limit(20)
        .select(["text"]);

    for size in [100, 1000, 10000].iter() {
        let data = records(*size);
        group.bench_with_input(BenchmarkId::new("filter_sort_page", size), &data, |b, data| {
            b.iter(|| query.apply(black_box(data.clone())))
        });
    }

    group.bench_function("query_string_roundtrip", |b| {
        b.iter(|| {
            let qs = black_box(&query).to_query_string();
            Query::from_query_string(&qs)
        })
    });

    group.finish();
}

fn bench_sync_roundtrip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut group = c.benchmark_group("sync_roundtrip");

    group.bench_function("create_through_memory", |b| {
        let sync = TableSync::new("todos", Arc::new(MemoryAdapter::new()));
        b.iter(|| {
            let mut fields = Fields::new();
            fields.insert("text".into(), json!("bench"));
            runtime.block_on(sync.create().trigger(black_box(fields)))
        })
    });

    group.bench_function("list_1000_through_memory", |b| {
        let adapter = MemoryAdapter::new().with_records("todos", records(1000));
        let sync = TableSync::new("todos", Arc::new(adapter));
        b.iter(|| runtime.block_on(sync.list().trigger(black_box(Query::new().limit(50)))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_index_operations,
    bench_list_merge,
    bench_query_apply,
    bench_sync_roundtrip
);
criterion_main!(benches);
