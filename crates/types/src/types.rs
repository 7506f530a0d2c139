//! Identifier helpers and relation filters.

use crate::{Object, ObjectIdentifier, Relation, RelationIdentifier};

/// Default schema-manifest name inside the `_manifest` bucket.
pub const DEFAULT_MANIFEST: &str = "default";

/// Identity accessors shared by objects and object identifiers.
pub trait ObjectIdentity {
    /// Object type.
    fn object_type(&self) -> &str;
    /// Object id.
    fn object_id(&self) -> &str;

    /// Returns an owned identifier.
    fn to_identifier(&self) -> ObjectIdentifier {
        ObjectIdentifier {
            object_type: self.object_type().to_string(),
            object_id: self.object_id().to_string(),
        }
    }
}

impl ObjectIdentity for Object {
    fn object_type(&self) -> &str {
        &self.r#type
    }

    fn object_id(&self) -> &str {
        &self.id
    }
}

impl ObjectIdentity for ObjectIdentifier {
    fn object_type(&self) -> &str {
        &self.object_type
    }

    fn object_id(&self) -> &str {
        &self.object_id
    }
}

/// Builds the identifier of a relation.
pub fn relation_identifier(rel: &Relation) -> RelationIdentifier {
    RelationIdentifier {
        object_type: rel.object_type.clone(),
        object_id: rel.object_id.clone(),
        relation: rel.relation.clone(),
        subject_type: rel.subject_type.clone(),
        subject_id: rel.subject_id.clone(),
        subject_relation: rel.subject_relation.clone(),
    }
}

/// Query over relation tuples.
///
/// Empty fields are unspecified. The store picks the object-primary index
/// when the object side is fully specified, the subject-primary index when
/// only the subject side is, and otherwise scans the object-primary index
/// from the longest usable prefix and filters the remaining fields in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    /// Object type.
    pub object_type: String,
    /// Object id.
    pub object_id: String,
    /// Relation name.
    pub relation: String,
    /// Subject type.
    pub subject_type: String,
    /// Subject id.
    pub subject_id: String,
    /// Subject relation.
    pub subject_relation: String,
}

impl RelationFilter {
    /// Filter for every relation on one object.
    pub fn for_object(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self { object_type: object_type.into(), object_id: object_id.into(), ..Self::default() }
    }

    /// Filter for every relation held by one subject.
    pub fn for_subject(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self { subject_type: subject_type.into(), subject_id: subject_id.into(), ..Self::default() }
    }

    /// Narrows the filter to one relation name.
    #[must_use]
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = relation.into();
        self
    }

    /// Whether the object type and id are both set.
    pub fn object_specified(&self) -> bool {
        !self.object_type.is_empty() && !self.object_id.is_empty()
    }

    /// Whether the subject type and id are both set.
    pub fn subject_specified(&self) -> bool {
        !self.subject_type.is_empty() && !self.subject_id.is_empty()
    }

    /// Applies every specified field as an equality predicate.
    pub fn matches(&self, rel: &Relation) -> bool {
        field_matches(&self.object_type, &rel.object_type)
            && field_matches(&self.object_id, &rel.object_id)
            && field_matches(&self.relation, &rel.relation)
            && field_matches(&self.subject_type, &rel.subject_type)
            && field_matches(&self.subject_id, &rel.subject_id)
            && field_matches(&self.subject_relation, &rel.subject_relation)
    }
}

impl From<&RelationIdentifier> for RelationFilter {
    fn from(id: &RelationIdentifier) -> Self {
        Self {
            object_type: id.object_type.clone(),
            object_id: id.object_id.clone(),
            relation: id.relation.clone(),
            subject_type: id.subject_type.clone(),
            subject_id: id.subject_id.clone(),
            subject_relation: id.subject_relation.clone(),
        }
    }
}

#[inline]
fn field_matches(filter: &str, value: &str) -> bool {
    filter.is_empty() || filter == value
}
