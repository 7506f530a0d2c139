//! Key encoding and relation scan benchmarks.

#![allow(clippy::expect_used, missing_docs)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use reldir_store::{Direction, KeyBufferPool, Store, buckets, keys, migrate, typed};
use reldir_types::{Relation, RelationFilter, config::StoreConfig};
use tempfile::TempDir;

fn relation(object_id: usize, subject_id: usize) -> Relation {
    Relation {
        object_type: "group".to_string(),
        object_id: format!("g{object_id:06}"),
        relation: "member".to_string(),
        subject_type: "user".to_string(),
        subject_id: format!("u{subject_id:06}"),
        ..Default::default()
    }
}

fn populated_store(temp_dir: &TempDir, groups: usize, members: usize) -> Store {
    let config = StoreConfig { db_path: temp_dir.path().join("bench.db"), ..StoreConfig::default() };
    let store = Store::open(&config).expect("open store");
    migrate::ensure(&store, true).expect("init");
    let txn = store.write().expect("write");
    for g in 0..groups {
        for m in 0..members {
            let rel = relation(g, m);
            for direction in Direction::BOTH {
                typed::set(&txn, &direction.bucket(), &keys::relation_key(direction, &rel), rel.clone())
                    .expect("set");
            }
        }
    }
    txn.commit().expect("commit");
    store
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_key");
    group.throughput(Throughput::Elements(1));
    let rel = relation(42, 7);

    group.bench_function("allocating", |b| {
        b.iter(|| black_box(keys::relation_key(Direction::ObjectToSubject, black_box(&rel))));
    });

    let pool = KeyBufferPool::default();
    group.bench_function("pooled", |b| {
        b.iter(|| {
            let mut buf = pool.get();
            keys::write_relation_key(&mut buf, Direction::SubjectToObject, black_box(&rel));
            black_box(buf.len())
        });
    });

    let key = keys::relation_key(Direction::ObjectToSubject, &rel);
    group.bench_function("parse", |b| {
        b.iter(|| black_box(keys::parse_relation_key(Direction::ObjectToSubject, black_box(&key))));
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("relation_scan");
    for members in [10, 100, 1000] {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = populated_store(&temp_dir, 50, members);
        let filter = RelationFilter::for_object("group", "g000025");
        let prefix = keys::relation_prefix(Direction::ObjectToSubject, &filter);

        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::new("members", members), &members, |b, _| {
            b.iter(|| {
                let txn = store.read().expect("read");
                let found: Vec<(Vec<u8>, Relation)> =
                    typed::scan(&txn, &buckets::relations_obj(), &prefix).expect("scan");
                black_box(found.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_scan);
criterion_main!(benches);
