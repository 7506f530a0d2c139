//! Fixture builders for directory entities.

use reldir_types::{Object, Relation, RelationIdentifier, properties};

/// Manifest body accepted by the default model compiler.
///
/// Types: `user`, `group` (nested membership), `folder` and `document`
/// (permission inherited from the parent folder).
pub const SAMPLE_MANIFEST: &str = r#"{
  "model": { "version": 3 },
  "types": {
    "user": {},
    "group": {
      "relations": { "member": "user | group#member" }
    },
    "folder": {
      "relations": {
        "owner": "user",
        "viewer": "user | group#member"
      },
      "permissions": { "can_view": "viewer | owner" }
    },
    "document": {
      "relations": {
        "parent": "folder",
        "viewer": "user | user:*"
      },
      "permissions": { "can_view": "viewer | parent->can_view" }
    }
  }
}"#;

/// Smaller manifest without `document`, for model-update compatibility tests.
pub const MANIFEST_WITHOUT_DOCUMENTS: &str = r#"{
  "model": { "version": 3 },
  "types": {
    "user": {},
    "group": { "relations": { "member": "user | group#member" } },
    "folder": {
      "relations": { "owner": "user", "viewer": "user | group#member" },
      "permissions": { "can_view": "viewer | owner" }
    }
  }
}"#;

/// Object with a display name derived from its id.
pub fn object(object_type: &str, id: &str) -> Object {
    Object {
        r#type: object_type.to_string(),
        id: id.to_string(),
        display_name: format!("{object_type} {id}"),
        ..Default::default()
    }
}

/// Object carrying JSON properties.
pub fn object_with_properties(object_type: &str, id: &str, props: serde_json::Value) -> Object {
    Object { properties: Some(properties::from_json(props)), ..object(object_type, id) }
}

/// Direct relation `object_type:object_id#relation@subject_type:subject_id`.
pub fn relation(
    object: (&str, &str),
    relation: &str,
    subject: (&str, &str),
) -> Relation {
    Relation {
        object_type: object.0.to_string(),
        object_id: object.1.to_string(),
        relation: relation.to_string(),
        subject_type: subject.0.to_string(),
        subject_id: subject.1.to_string(),
        ..Default::default()
    }
}

/// Indirect relation through the subject's own relation, e.g. `group:eng#member`.
pub fn subject_set(
    object: (&str, &str),
    relation_name: &str,
    subject: (&str, &str),
    subject_relation: &str,
) -> Relation {
    Relation { subject_relation: subject_relation.to_string(), ..relation(object, relation_name, subject) }
}

/// Identifier of a relation fixture.
pub fn relation_id(rel: &Relation) -> RelationIdentifier {
    reldir_types::relation_identifier(rel)
}
