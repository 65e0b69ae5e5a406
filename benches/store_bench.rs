use criterion::{black_box, criterion_group, criterion_main, Criterion};
use blobsync::storage::{Database, DatabaseRouter, InMemoryStorage, RecordStore};
use blobsync_core::{parse_batch, Record};
use serde_json::{json, Value};

fn setup() -> RecordStore {
    let database = Database::open(
        "statements",
        &["statements", "standingorders"],
        Box::new(InMemoryStorage::new("statements")),
    )
    .unwrap();
    DatabaseRouter::new()
        .with_database(database)
        .resolve("statements", "statements")
        .unwrap()
}

fn records(count: usize, version: u64) -> Vec<Record> {
    (0..count)
        .map(|i| Record::new(format!("r{}", i), "x".repeat(256)).with_sync_info(1_700_000_000_000u64 + i as u64, version))
        .collect()
}

fn seed(store: &RecordStore, count: usize) {
    store.upsert_many(records(count, 1)).unwrap();
}

fn bench_parse_batch(c: &mut Criterion) {
    let body: Value = Value::Array(
        (0..100)
            .map(|i| json!({ "id": format!("r{}", i), "encryptedData": "x".repeat(256), "lastModified": i, "version": 1 }))
            .collect(),
    );
    c.bench_function("parse_batch_100", |b| {
        b.iter(|| parse_batch(black_box(body.clone())).unwrap())
    });
}

fn bench_upsert(c: &mut Criterion) {
    let store = setup();
    seed(&store, 1000);

    let batch = records(100, 2);
    c.bench_function("upsert_100_into_1000", |b| {
        b.iter(|| store.upsert_many(black_box(batch.clone())).unwrap())
    });

    let single = vec![Record::new("new", "payload")];
    c.bench_function("upsert_single", |b| {
        b.iter(|| store.upsert_many(black_box(single.clone())).unwrap())
    });
}

fn bench_reads(c: &mut Criterion) {
    let store = setup();
    seed(&store, 1000);

    c.bench_function("list_metadata_1000", |b| {
        b.iter(|| store.list_metadata().unwrap())
    });

    c.bench_function("get_by_id", |b| {
        b.iter(|| store.get(black_box("r500")).unwrap())
    });
}

fn bench_delete_missing(c: &mut Criterion) {
    let store = setup();
    seed(&store, 1000);

    c.bench_function("delete_absent_id", |b| {
        b.iter(|| store.delete(black_box("nope")).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse_batch,
    bench_upsert,
    bench_reads,
    bench_delete_missing
);
criterion_main!(benches);
