//! Proptest strategies for directory entities.
//!
//! ```no_run
//! use proptest::prelude::*;
//! use reldir_test_utils::strategies;
//!
//! proptest! {
//!     #[test]
//!     fn stored_relations_round_trip(rel in strategies::arb_relation()) {
//!         // ...
//!     }
//! }
//! ```

use std::collections::BTreeMap;

use proptest::prelude::*;
use reldir_types::{Object, Relation};

/// Identifier segment: never contains the `\0` or `\x1f` key separators.
pub fn arb_identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9_.:@|#-]{0,23}"
}

/// One of the object types declared by the sample manifest.
pub fn arb_object_type() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "user".to_string(),
        "group".to_string(),
        "folder".to_string(),
        "document".to_string(),
    ])
}

/// Object with a random type, id and display name.
pub fn arb_object() -> impl Strategy<Value = Object> {
    (arb_object_type(), arb_identifier(), "[ -~]{0,32}").prop_map(|(object_type, id, display)| {
        Object { r#type: object_type, id, display_name: display, ..Default::default() }
    })
}

/// Relation with an optional subject relation.
pub fn arb_relation() -> impl Strategy<Value = Relation> {
    (
        arb_object_type(),
        arb_identifier(),
        prop::sample::select(vec!["member", "owner", "viewer", "parent"]),
        arb_object_type(),
        arb_identifier(),
        proptest::option::of(Just("member")),
    )
        .prop_map(|(ot, oid, rel, st, sid, srel)| Relation {
            object_type: ot,
            object_id: oid,
            relation: rel.to_string(),
            subject_type: st,
            subject_id: sid,
            subject_relation: srel.unwrap_or_default().to_string(),
            ..Default::default()
        })
}

/// 1-30 relations with distinct tuples, in tuple order.
pub fn arb_relation_set() -> impl Strategy<Value = Vec<Relation>> {
    proptest::collection::vec(arb_relation(), 1..30).prop_map(|rels| {
        let unique: BTreeMap<[String; 6], Relation> = rels
            .into_iter()
            .map(|r| {
                let key = [
                    r.object_type.clone(),
                    r.object_id.clone(),
                    r.relation.clone(),
                    r.subject_type.clone(),
                    r.subject_id.clone(),
                    r.subject_relation.clone(),
                ];
                (key, r)
            })
            .collect();
        unique.into_values().collect()
    })
}
