//! Store integration tests.
//!
//! Exercises the file-backed engine end to end: pagination over both
//! relation indexes, migration with on-disk backups, and key encoding
//! properties.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use reldir_store::{
    Direction, PageOptions, ReadTxn, Result, Store, StoreError, WriteTxn, buckets,
    keys::{self, RelationTuple},
    migrate::{self, REQUIRED_VERSION, SchemaVersion},
    page, typed,
};
use reldir_test_utils::TestDir;
use reldir_types::{Relation, RelationFilter, config::StoreConfig};

// ============================================================================
// Helpers
// ============================================================================

fn relation(object_id: &str, relation: &str, subject_id: &str) -> Relation {
    Relation {
        object_type: "group".to_string(),
        object_id: object_id.to_string(),
        relation: relation.to_string(),
        subject_type: "user".to_string(),
        subject_id: subject_id.to_string(),
        ..Default::default()
    }
}

fn put_both(txn: &impl WriteTxn, rel: &Relation) -> Result<()> {
    for direction in Direction::BOTH {
        typed::set(txn, &direction.bucket(), &keys::relation_key(direction, rel), rel.clone())?;
    }
    Ok(())
}

fn open(dir: &TestDir) -> Store {
    let config = StoreConfig { db_path: dir.join("reldir.db"), ..StoreConfig::default() };
    let store = Store::open(&config).expect("open store");
    migrate::ensure(&store, true).expect("initialize");
    store
}

/// Runs a filtered relation query the way the directory does: index chosen
/// by specificity, longest prefix, residual filter.
fn query_all(store: &Store, filter: &RelationFilter, page_size: u32) -> Vec<Relation> {
    let direction = Direction::for_filter(filter);
    let prefix = keys::relation_prefix(direction, filter);
    let txn = store.read().expect("read");
    let mut options = PageOptions::new(page_size);
    let mut out = Vec::new();
    loop {
        let page = page::paginate(
            &txn,
            &direction.bucket(),
            &prefix,
            &options,
            100,
            |_, rel: Relation| Ok(filter.matches(&rel).then_some(rel)),
        )
        .expect("page");
        out.extend(page.results);
        if page.next_token.is_empty() {
            return out;
        }
        options = options.with_token(page.next_token);
    }
}

// ============================================================================
// Relation scans
// ============================================================================

#[test]
fn test_prefix_scan_uses_the_specified_side() {
    let dir = TestDir::new();
    let store = open(&dir);
    store
        .update(|txn| -> Result<()> {
            put_both(txn, &relation("A", "member", "X"))?;
            put_both(txn, &relation("A", "member", "Y"))?;
            put_both(txn, &relation("A", "owner", "Z"))?;
            put_both(txn, &relation("B", "member", "X"))?;
            Ok(())
        })
        .expect("seed");

    let by_object = RelationFilter::for_object("group", "A").with_relation("member");
    assert_eq!(Direction::for_filter(&by_object), Direction::ObjectToSubject);
    let subjects: Vec<String> =
        query_all(&store, &by_object, 10).into_iter().map(|r| r.subject_id).collect();
    assert_eq!(subjects, ["X", "Y"]);

    let by_subject = RelationFilter::for_subject("user", "X");
    assert_eq!(Direction::for_filter(&by_subject), Direction::SubjectToObject);
    let objects: Vec<String> =
        query_all(&store, &by_subject, 10).into_iter().map(|r| r.object_id).collect();
    assert_eq!(objects, ["A", "B"]);
}

#[test]
fn test_underspecified_query_filters_residual_fields() {
    let dir = TestDir::new();
    let store = open(&dir);
    store
        .update(|txn| -> Result<()> {
            for (obj, rel, sub) in [("A", "member", "X"), ("B", "owner", "X"), ("C", "member", "Y")]
            {
                put_both(txn, &relation(obj, rel, sub))?;
            }
            Ok(())
        })
        .expect("seed");

    let filter = RelationFilter { relation: "member".into(), ..Default::default() };
    assert!(keys::relation_prefix(Direction::for_filter(&filter), &filter).is_empty());
    let found: Vec<String> =
        query_all(&store, &filter, 1).into_iter().map(|r| r.object_id).collect();
    assert_eq!(found, ["A", "C"]);
}

#[test]
fn test_token_from_other_query_is_rejected() {
    let dir = TestDir::new();
    let store = open(&dir);
    store.update(|txn| put_both(txn, &relation("A", "member", "X"))).expect("seed");
    let txn = store.read().expect("read");
    let token = page::encode_token(b"user\0X\x1fmember");
    let err = page::paginate(
        &txn,
        &buckets::relations_obj(),
        b"group\0A\x1f",
        &PageOptions::new(1).with_token(token),
        100,
        |_, rel: Relation| Ok(Some(rel)),
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPageToken { .. }));
}

// ============================================================================
// Migration
// ============================================================================

#[test]
fn test_migration_writes_backup_and_is_idempotent() {
    let dir = TestDir::new();
    let config = StoreConfig { db_path: dir.join("old.db"), ..StoreConfig::default() };
    {
        let store = Store::open(&config).expect("open");
        let txn = store.write().expect("write");
        for path in buckets::required() {
            txn.create_bucket(&path).expect("bucket");
        }
        txn.put_raw(&buckets::system(), buckets::VERSION_KEY, b"0.0.2").expect("version");
        let rel = relation("A", "member", "X");
        typed::set(
            &txn,
            &buckets::relations_obj(),
            &keys::relation_key(Direction::ObjectToSubject, &rel),
            rel.clone(),
        )
        .expect("relation");
        txn.commit().expect("commit");
    }

    let store = Store::open(&config).expect("reopen");
    let report = migrate::migrate(&store).expect("migrate");
    assert_eq!(report.from, Some(SchemaVersion::new(0, 0, 2)));
    assert_eq!(report.to, REQUIRED_VERSION);
    let backup = migrate::backup_path(&config.db_path, SchemaVersion::new(0, 0, 2));
    assert_eq!(report.backups, vec![backup.clone()]);
    assert!(backup.exists());

    let second = migrate::migrate(&store).expect("second run");
    assert!(second.is_noop());
    assert_eq!(migrate::current_version(&store).expect("version"), Some(REQUIRED_VERSION));
}

#[test]
fn test_higher_version_blocks_open() {
    let dir = TestDir::new();
    let store = open(&dir);
    store
        .update(|txn| txn.put_raw(&buckets::system(), buckets::VERSION_KEY, b"9.0.0"))
        .expect("bump");
    let err = migrate::ensure(&store, true).unwrap_err();
    assert!(matches!(err, StoreError::SchemaVersionHigher { .. }));
    assert_eq!(err.code(), reldir_types::ErrorCode::SchemaVersionHigher);
}

#[test]
fn test_snapshot_readers_do_not_see_uncommitted_writes() {
    let dir = TestDir::new();
    let store = open(&dir);
    let reader = store.read().expect("read");
    let writer = store.write().expect("write");
    put_both(&writer, &relation("A", "member", "X")).expect("put");
    assert_eq!(reader.bucket_len(&buckets::relations_obj()).expect("len"), 0);
    writer.commit().expect("commit");
    assert_eq!(reader.bucket_len(&buckets::relations_obj()).expect("len"), 0);
    assert_eq!(store.read().expect("read").bucket_len(&buckets::relations_obj()).expect("len"), 1);
}

// ============================================================================
// Properties
// ============================================================================

fn ident() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.:@|#-]{1,12}"
}

fn arb_relation() -> impl Strategy<Value = Relation> {
    (ident(), ident(), ident(), ident(), ident(), proptest::option::of(ident())).prop_map(
        |(ot, oid, rel, st, sid, srel)| Relation {
            object_type: ot,
            object_id: oid,
            relation: rel,
            subject_type: st,
            subject_id: sid,
            subject_relation: srel.unwrap_or_default(),
            ..Default::default()
        },
    )
}

proptest! {
    #[test]
    fn prop_relation_keys_parse_back(rel in arb_relation()) {
        for direction in Direction::BOTH {
            let key = keys::relation_key(direction, &rel);
            let parsed = keys::parse_relation_key(direction, &key).expect("parse");
            prop_assert_eq!(parsed.tuple(), rel.tuple());
        }
    }

    #[test]
    fn prop_full_filter_prefix_matches_key(rel in arb_relation()) {
        let filter = RelationFilter::from(&reldir_types::relation_identifier(&rel));
        for direction in Direction::BOTH {
            let key = keys::relation_key(direction, &rel);
            prop_assert!(key.starts_with(&keys::relation_prefix(direction, &filter)));
        }
    }

    #[test]
    fn prop_pages_cover_every_match_once(
        subjects in proptest::collection::btree_set("[a-z]{1,6}", 0..40),
        page_size in 1u32..8,
    ) {
        let store = Store::in_memory().expect("open");
        migrate::ensure(&store, true).expect("init");
        store.update(|txn| -> Result<()> {
            for sub in &subjects {
                put_both(txn, &relation("A", "member", sub))?;
                put_both(txn, &relation("B", "member", sub))?;
            }
            Ok(())
        }).expect("seed");

        let filter = RelationFilter::for_object("group", "A");
        let found = query_all(&store, &filter, page_size);
        let ids: Vec<String> = found.iter().map(|r| r.subject_id.clone()).collect();
        let expected: Vec<String> = subjects.iter().cloned().collect();
        prop_assert_eq!(&ids, &expected);
        let unique: BTreeSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }
}
