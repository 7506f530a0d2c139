//! Directory integration tests.
//!
//! Drives the public [`Directory`] API against in-memory and file-backed
//! stores: etag behavior, conditional writes, pagination, both relation
//! indexes and cascading deletes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

use std::sync::Arc;

use proptest::prelude::*;
use reldir_directory::{Directory, DirectoryError, ManifestCompiler};
use reldir_store::PageOptions;
use reldir_test_utils::{TestDir, fixtures, strategies};
use reldir_types::{
    ErrorCode, Object, ObjectIdentifier, Relation, RelationFilter, RelationIdentifier,
    config::DirectoryConfig,
};

// ============================================================================
// Helpers
// ============================================================================

fn directory() -> Directory {
    Directory::in_memory(Arc::new(ManifestCompiler)).expect("directory")
}

fn object_id(object_type: &str, id: &str) -> ObjectIdentifier {
    ObjectIdentifier { object_type: object_type.into(), object_id: id.into() }
}

fn all_relations(dir: &Directory, filter: &RelationFilter, size: u32) -> Vec<Relation> {
    let mut options = PageOptions::new(size);
    let mut out = Vec::new();
    loop {
        let page = dir.get_relations(filter, &options, false).expect("page").relations;
        out.extend(page.results);
        if page.next_token.is_empty() {
            return out;
        }
        options = options.with_token(page.next_token);
    }
}

fn all_objects(dir: &Directory, object_type: &str, size: u32) -> Vec<Object> {
    let mut options = PageOptions::new(size);
    let mut out = Vec::new();
    loop {
        let page = dir.get_objects(object_type, &options).expect("page");
        out.extend(page.results);
        if page.next_token.is_empty() {
            return out;
        }
        options = options.with_token(page.next_token);
    }
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_object_round_trip_stamps_metadata() {
    let dir = directory();
    let input = fixtures::object_with_properties("user", "alice", serde_json::json!({"team": "eng"}));
    let stored = dir.set_object(input.clone()).expect("set").value;
    assert!(!stored.etag.is_empty());
    assert!(stored.created_at.is_some());
    assert!(stored.updated_at.is_some());

    let read = dir
        .get_object(&object_id("user", "alice"), false, &PageOptions::default())
        .expect("get")
        .object;
    assert_eq!(read, stored);
    assert_eq!(read.properties, input.properties);
}

#[test]
fn test_etag_is_stable_for_unchanged_content() {
    let dir = directory();
    let first = dir.set_object(fixtures::object("user", "a")).expect("first");
    let second = dir.set_object(fixtures::object("user", "a")).expect("second");
    assert!(first.written);
    assert!(!second.written);
    assert_eq!(first.value.etag, second.value.etag);
    assert_eq!(first.value.updated_at, second.value.updated_at);

    let mut changed = fixtures::object("user", "a");
    changed.display_name = "Alice".into();
    let third = dir.set_object(changed).expect("third");
    assert!(third.written);
    assert_ne!(third.value.etag, first.value.etag);
    assert_eq!(third.value.created_at, first.value.created_at);
}

#[test]
fn test_stale_etag_leaves_store_unmodified() {
    let dir = directory();
    let stored = dir.set_object(fixtures::object("user", "a")).expect("set").value;

    let mut update = fixtures::object("user", "a");
    update.display_name = "changed".into();
    update.etag = "12345".into();
    let err = dir.set_object(update).unwrap_err();
    assert!(err.is_hash_mismatch());

    let err = dir.delete_object(&object_id("user", "a"), "12345", false).unwrap_err();
    assert!(matches!(err, DirectoryError::HashMismatch { .. }));

    let read = dir.get_object(&object_id("user", "a"), false, &PageOptions::default()).expect("get");
    assert_eq!(read.object, stored);

    let mut update = fixtures::object("user", "a");
    update.etag = stored.etag.clone();
    update.display_name = "fresh".into();
    assert!(dir.set_object(update).expect("matching etag").written);
}

#[test]
fn test_delete_is_idempotent() {
    let dir = directory();
    dir.set_object(fixtures::object("user", "a")).expect("set");
    assert!(dir.delete_object(&object_id("user", "a"), "", false).expect("delete").existed);
    assert!(!dir.delete_object(&object_id("user", "a"), "", false).expect("again").existed);

    let rel = fixtures::relation(("group", "g"), "member", ("user", "a"));
    dir.set_relation(rel.clone()).expect("relation");
    let id = fixtures::relation_id(&rel);
    assert!(dir.delete_relation(&id, "").expect("delete"));
    assert!(!dir.delete_relation(&id, "").expect("again"));
}

#[test]
fn test_object_pagination_is_complete() {
    let dir = directory();
    for i in 0..23 {
        dir.set_object(fixtures::object("user", &format!("u{i:02}"))).expect("set");
    }
    dir.set_object(fixtures::object("group", "g")).expect("group");

    let users = all_objects(&dir, "user", 5);
    assert_eq!(users.len(), 23);
    assert!(users.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(all_objects(&dir, "", 7).len(), 24);
}

#[test]
fn test_foreign_page_token_rejected() {
    let dir = directory();
    let options = PageOptions::new(5).with_token("not-a-token");
    let err = dir.get_objects("user", &options).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPageToken);
}

// ============================================================================
// Relations
// ============================================================================

#[test]
fn test_prefix_scan_does_not_bleed_into_longer_ids() {
    let dir = directory();
    dir.set_relation(fixtures::relation(("group", "A"), "member", ("user", "x")))
        .expect("A");
    dir.set_relation(fixtures::relation(("group", "AA"), "member", ("user", "y")))
        .expect("AA");
    dir.set_relation(fixtures::relation(("group", "A"), "owner", ("user", "z")))
        .expect("A owner");

    let rels = all_relations(&dir, &RelationFilter::for_object("group", "A"), 10);
    assert_eq!(rels.len(), 2);
    assert!(rels.iter().all(|r| r.object_id == "A"));

    let members =
        all_relations(&dir, &RelationFilter::for_object("group", "A").with_relation("member"), 10);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].subject_id, "x");

    let by_subject = all_relations(&dir, &RelationFilter::for_subject("user", "y"), 10);
    assert_eq!(by_subject.len(), 1);
    assert_eq!(by_subject[0].object_id, "AA");
}

#[test]
fn test_cascade_removes_both_sides() {
    let dir = directory();
    dir.set_object(fixtures::object("user", "a")).expect("user");
    dir.set_relation(fixtures::relation(("group", "g1"), "member", ("user", "a")))
        .expect("subject side");
    dir.set_relation(fixtures::relation(("user", "a"), "manager", ("user", "b")))
        .expect("object side");
    dir.set_relation(fixtures::relation(("group", "g1"), "member", ("user", "c")))
        .expect("unrelated");

    let outcome = dir.delete_object(&object_id("user", "a"), "", true).expect("delete");
    assert!(outcome.existed);
    assert_eq!(outcome.relations, 2);

    assert!(all_relations(&dir, &RelationFilter::for_subject("user", "a"), 10).is_empty());
    assert!(all_relations(&dir, &RelationFilter::for_object("user", "a"), 10).is_empty());
    assert_eq!(all_relations(&dir, &RelationFilter::for_object("group", "g1"), 10).len(), 1);
    assert_eq!(dir.stats().expect("stats").total_relations(), 1);
}

#[test]
fn test_get_relation_with_objects() {
    let dir = directory();
    dir.set_object(fixtures::object("user", "x")).expect("user");
    let rel = fixtures::relation(("group", "A"), "member", ("user", "x"));
    dir.set_relation(rel.clone()).expect("relation");

    let found = dir.get_relation(&fixtures::relation_id(&rel), true).expect("get");
    assert_eq!(found.relation.subject_id, "x");
    assert!(found.object.is_none());
    assert_eq!(found.subject.expect("subject").id, "x");
}

#[test]
fn test_get_relation_requires_full_identifier() {
    let dir = directory();
    let rel = fixtures::relation(("group", "A"), "member", ("user", "X"));
    dir.set_relation(rel.clone()).expect("relation");

    let blank = RelationIdentifier::default();
    let err = dir.get_relation(&blank, false).unwrap_err();
    assert!(matches!(err, DirectoryError::Validation { .. }), "got {err:?}");
    assert_eq!(err.code(), ErrorCode::InvalidArgument);

    let partial = RelationIdentifier {
        object_type: "group".into(),
        object_id: "A".into(),
        relation: "member".into(),
        ..RelationIdentifier::default()
    };
    assert!(matches!(dir.get_relation(&partial, false), Err(DirectoryError::Validation { .. })));

    let exact = dir.get_relation(&fixtures::relation_id(&rel), false).expect("exact lookup");
    assert_eq!(exact.relation.subject_id, "X");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_both_indexes_agree(rels in strategies::arb_relation_set()) {
        let dir = directory();
        for rel in &rels {
            dir.set_relation(rel.clone()).expect("set");
        }
        for rel in &rels {
            let by_object = all_relations(
                &dir,
                &RelationFilter::for_object(&rel.object_type, &rel.object_id).with_relation(&rel.relation),
                7,
            );
            let by_subject =
                all_relations(&dir, &RelationFilter::for_subject(&rel.subject_type, &rel.subject_id), 7);
            let same = |r: &Relation| fixtures::relation_id(r) == fixtures::relation_id(rel);
            prop_assert!(by_object.iter().any(same));
            prop_assert!(by_subject.iter().any(same));
        }
        prop_assert_eq!(dir.stats().expect("stats").total_relations(), rels.len() as u64);

        for rel in &rels {
            prop_assert!(dir.delete_relation(&fixtures::relation_id(rel), "").expect("delete"));
        }
        let empty = all_relations(&dir, &RelationFilter::default(), 50);
        prop_assert!(empty.is_empty());
    }
}

// ============================================================================
// File-backed
// ============================================================================

#[test]
fn test_reopen_keeps_data_and_model() {
    let tmp = TestDir::new();
    let config = DirectoryConfig::with_db_path(tmp.join("reldir.db"));
    {
        let dir = Directory::open(config.clone(), Arc::new(ManifestCompiler)).expect("open");
        dir.set_manifest(fixtures::SAMPLE_MANIFEST.as_bytes()).expect("manifest");
        dir.set_object(fixtures::object("user", "a")).expect("set");
    }

    let dir = Directory::open(config, Arc::new(ManifestCompiler)).expect("reopen");
    let model = dir.model().expect("model reloaded");
    assert!(model.model().object_exists("document"));
    let read = dir.get_object(&object_id("user", "a"), false, &PageOptions::default()).expect("get");
    assert_eq!(read.object.id, "a");
}
