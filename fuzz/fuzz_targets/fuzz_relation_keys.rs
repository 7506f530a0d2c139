//! Fuzz target for object and relation key decoding.
//!
//! Arbitrary bytes must never panic either parser. Any key that parses must
//! re-encode to the same bytes, and a relation must parse back identically
//! from the opposite index.

#![no_main]

use libfuzzer_sys::fuzz_target;
use reldir_store::{
    Direction,
    keys::{object_key, parse_object_key, parse_relation_key, relation_key},
};

fuzz_target!(|data: &[u8]| {
    if let Ok(id) = parse_object_key(data) {
        assert_eq!(object_key(&id.object_type, &id.object_id), data, "object key not canonical");
    }

    for direction in Direction::BOTH {
        let Ok(id) = parse_relation_key(direction, data) else {
            continue;
        };
        assert_eq!(relation_key(direction, &id), data, "relation key not canonical");

        let other = match direction {
            Direction::ObjectToSubject => Direction::SubjectToObject,
            Direction::SubjectToObject => Direction::ObjectToSubject,
        };
        let mirrored = relation_key(other, &id);
        let back = parse_relation_key(other, &mirrored).expect("mirrored key parses");
        assert_eq!(back, id, "indexes disagree");
    }
});
