//! Compiled authorization model and directory statistics.
//!
//! The [`Model`] is the queryable form of a manifest body. It is persisted
//! as JSON next to the manifest and cached in memory by the directory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Relation;

/// Compiled authorization model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Manifest format version the model was compiled from.
    #[serde(default)]
    pub version: u32,
    /// Object types keyed by name.
    #[serde(default)]
    pub types: BTreeMap<String, ObjectTypeDef>,
}

/// Relations and permissions declared on one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTypeDef {
    /// Relations keyed by name.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDef>,
    /// Permissions keyed by name.
    #[serde(default)]
    pub permissions: BTreeMap<String, PermissionDef>,
}

/// Subjects a relation may point at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Allowed subject references, in declaration order.
    pub subjects: Vec<SubjectRef>,
}

/// One allowed subject: `user`, `group#member` or `user:*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    /// Subject object type.
    pub subject_type: String,
    /// Subject relation for indirect (set) subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Whether any instance of the subject type matches.
    #[serde(default)]
    pub wildcard: bool,
}

/// A permission is a union of terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
    /// Terms; the permission holds when any term holds.
    pub union: Vec<PermissionTerm>,
}

/// A term in a permission union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionTerm {
    /// The subject holds the named relation or permission on the object.
    Relation {
        /// Relation or permission name on the same object type.
        name: String,
    },
    /// The subject holds `permission` on some object reached through `relation`.
    Arrow {
        /// Relation on this object leading to other objects.
        relation: String,
        /// Relation or permission evaluated on those objects.
        permission: String,
    },
}

impl Model {
    /// Whether the object type is declared.
    pub fn object_exists(&self, object_type: &str) -> bool {
        self.types.contains_key(object_type)
    }

    /// Whether the relation is declared on the object type.
    pub fn relation_exists(&self, object_type: &str, relation: &str) -> bool {
        self.types.get(object_type).is_some_and(|t| t.relations.contains_key(relation))
    }

    /// Whether the permission is declared on the object type.
    pub fn permission_exists(&self, object_type: &str, permission: &str) -> bool {
        self.types.get(object_type).is_some_and(|t| t.permissions.contains_key(permission))
    }

    /// Whether a relation may point at the given subject type and subject relation.
    pub fn subject_allowed(
        &self,
        object_type: &str,
        relation: &str,
        subject_type: &str,
        subject_relation: &str,
    ) -> bool {
        let Some(def) = self.types.get(object_type).and_then(|t| t.relations.get(relation)) else {
            return false;
        };
        def.subjects.iter().any(|s| {
            s.subject_type == subject_type
                && match (&s.relation, subject_relation.is_empty()) {
                    (None, true) => true,
                    (Some(r), false) => r == subject_relation,
                    _ => false,
                }
        })
    }

    /// Lists what the model would orphan if it replaced the current one.
    ///
    /// Every object type, relation and subject type in use must still be
    /// declared. An empty result means the update is safe.
    pub fn incompatibilities(&self, stats: &Stats) -> Vec<String> {
        let mut problems = Vec::new();
        for (object_type, type_stats) in &stats.object_types {
            if !self.object_exists(object_type) {
                if type_stats.objects > 0 || type_stats.relation_count() > 0 {
                    problems.push(format!("object type {object_type:?} is in use"));
                }
                continue;
            }
            for (relation, rel_stats) in &type_stats.relations {
                if rel_stats.count == 0 {
                    continue;
                }
                if !self.relation_exists(object_type, relation) {
                    problems.push(format!("relation {object_type}#{relation} is in use"));
                    continue;
                }
                for subject in rel_stats.subjects.keys() {
                    let (subject_type, subject_relation) =
                        subject.split_once('#').unwrap_or((subject.as_str(), ""));
                    if !self.subject_allowed(object_type, relation, subject_type, subject_relation)
                    {
                        problems.push(format!(
                            "subject {subject} on {object_type}#{relation} is in use"
                        ));
                    }
                }
            }
        }
        problems
    }
}

/// Object and relation counts by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Per object type counts.
    #[serde(default)]
    pub object_types: BTreeMap<String, TypeStats>,
}

/// Counts for one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStats {
    /// Number of objects of this type.
    #[serde(default)]
    pub objects: u64,
    /// Relations on objects of this type, keyed by relation name.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationStats>,
}

/// Counts for one relation name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStats {
    /// Number of relation tuples.
    pub count: u64,
    /// Tuple counts keyed by `subject_type` or `subject_type#subject_relation`.
    #[serde(default)]
    pub subjects: BTreeMap<String, u64>,
}

impl TypeStats {
    /// Total relation tuples on this object type.
    pub fn relation_count(&self) -> u64 {
        self.relations.values().map(|r| r.count).sum()
    }
}

impl Stats {
    /// Counts one object.
    pub fn add_object(&mut self, object_type: &str) {
        self.object_types.entry(object_type.to_string()).or_default().objects += 1;
    }

    /// Counts one relation tuple.
    pub fn add_relation(&mut self, rel: &Relation) {
        let entry = self
            .object_types
            .entry(rel.object_type.clone())
            .or_default()
            .relations
            .entry(rel.relation.clone())
            .or_default();
        entry.count += 1;
        let subject = if rel.subject_relation.is_empty() {
            rel.subject_type.clone()
        } else {
            format!("{}#{}", rel.subject_type, rel.subject_relation)
        };
        *entry.subjects.entry(subject).or_default() += 1;
    }

    /// Total objects across all types.
    pub fn total_objects(&self) -> u64 {
        self.object_types.values().map(|t| t.objects).sum()
    }

    /// Total relation tuples across all types.
    pub fn total_relations(&self) -> u64 {
        self.object_types.values().map(TypeStats::relation_count).sum()
    }
}

/// Permission or relation check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Object type.
    pub object_type: String,
    /// Object id.
    pub object_id: String,
    /// Relation or permission name.
    pub relation: String,
    /// Subject type.
    pub subject_type: String,
    /// Subject id.
    pub subject_id: String,
    /// Collect the evaluation path.
    #[serde(default)]
    pub trace: bool,
}

/// Check outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Whether the subject holds the relation or permission.
    pub check: bool,
    /// Evaluation steps when tracing was requested.
    #[serde(default)]
    pub trace: Vec<String>,
    /// Set when the check could not be evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request for every subject reachable through a relation or permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRequest {
    /// Object type.
    pub object_type: String,
    /// Object id.
    pub object_id: String,
    /// Relation or permission name.
    pub relation: String,
    /// Subject type to collect.
    pub subject_type: String,
    /// Subject relation to collect (empty for direct subjects).
    #[serde(default)]
    pub subject_relation: String,
}
