//! Built-in manifest compiler and graph-walking model cache.
//!
//! Manifest bodies are JSON:
//!
//! ```json
//! {
//!   "model": { "version": 3 },
//!   "types": {
//!     "group": {
//!       "relations": { "member": "user | group#member" },
//!       "permissions": { "can_view": "member | parent->can_view" }
//!     }
//!   }
//! }
//! ```
//!
//! A relation lists allowed subjects: `type`, `type#relation` (subject set)
//! or `type:*` (wildcard). A permission is a union of relation or
//! permission names on the same type and arrows `relation->permission`.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use reldir_types::{
    CheckRequest, CheckResponse, GraphRequest, Model, ObjectIdentifier, ObjectTypeDef,
    PermissionDef, PermissionTerm, RelationDef, SubjectRef,
    validation::{FIELD_SEPARATOR, TYPE_ID_SEPARATOR},
};
use serde::Deserialize;

use crate::{
    error::{DirectoryError, Result},
    model::{ModelCache, ModelCompiler, RelationReader},
};

/// Nesting limit for subject sets and arrows.
const MAX_DEPTH: usize = 32;

/// Wildcard subject id.
pub const WILDCARD: &str = "*";

#[derive(Debug, Default, Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    model: ManifestHeader,
    #[serde(default)]
    types: BTreeMap<String, TypeDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestHeader {
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Default, Deserialize)]
struct TypeDoc {
    #[serde(default)]
    relations: BTreeMap<String, String>,
    #[serde(default)]
    permissions: BTreeMap<String, String>,
}

fn compile_error(message: impl Into<String>) -> DirectoryError {
    DirectoryError::ModelCompile { message: message.into() }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.bytes().any(|b| b == TYPE_ID_SEPARATOR || b == FIELD_SEPARATOR)
        || name.contains(['|', '#', ':', ' ']);
    if bad { Err(compile_error(format!("invalid {what} name {name:?}"))) } else { Ok(()) }
}

fn parse_subject(expr: &str) -> Result<SubjectRef> {
    if let Some(subject_type) = expr.strip_suffix(":*") {
        check_name("subject type", subject_type)?;
        return Ok(SubjectRef { subject_type: subject_type.to_string(), relation: None, wildcard: true });
    }
    match expr.split_once('#') {
        Some((subject_type, relation)) => {
            check_name("subject type", subject_type)?;
            check_name("subject relation", relation)?;
            Ok(SubjectRef {
                subject_type: subject_type.to_string(),
                relation: Some(relation.to_string()),
                wildcard: false,
            })
        },
        None => {
            check_name("subject type", expr)?;
            Ok(SubjectRef { subject_type: expr.to_string(), relation: None, wildcard: false })
        },
    }
}

fn parse_term(expr: &str) -> Result<PermissionTerm> {
    match expr.split_once("->") {
        Some((relation, permission)) => {
            let (relation, permission) = (relation.trim(), permission.trim());
            check_name("relation", relation)?;
            check_name("permission", permission)?;
            Ok(PermissionTerm::Arrow {
                relation: relation.to_string(),
                permission: permission.to_string(),
            })
        },
        None => {
            check_name("relation", expr)?;
            Ok(PermissionTerm::Relation { name: expr.to_string() })
        },
    }
}

fn union(expr: &str) -> impl Iterator<Item = &str> {
    expr.split('|').map(str::trim)
}

/// Cross-references every name in the compiled model.
fn resolve(model: &Model) -> Result<()> {
    let declared = |t: &str, name: &str| {
        model.relation_exists(t, name) || model.permission_exists(t, name)
    };
    for (type_name, def) in &model.types {
        for (relation, rel_def) in &def.relations {
            if def.permissions.contains_key(relation) {
                return Err(compile_error(format!(
                    "{type_name}#{relation} is both a relation and a permission"
                )));
            }
            for subject in &rel_def.subjects {
                if !model.object_exists(&subject.subject_type) {
                    return Err(compile_error(format!(
                        "{type_name}#{relation} references unknown type {:?}",
                        subject.subject_type
                    )));
                }
                if let Some(sub_rel) = &subject.relation {
                    if !declared(&subject.subject_type, sub_rel) {
                        return Err(compile_error(format!(
                            "{type_name}#{relation} references unknown {}#{sub_rel}",
                            subject.subject_type
                        )));
                    }
                }
            }
        }
        for (permission, perm_def) in &def.permissions {
            for term in &perm_def.union {
                match term {
                    PermissionTerm::Relation { name } if !declared(type_name, name) => {
                        return Err(compile_error(format!(
                            "{type_name}#{permission} references unknown {name:?}"
                        )));
                    },
                    PermissionTerm::Arrow { relation, .. }
                        if !model.relation_exists(type_name, relation) =>
                    {
                        return Err(compile_error(format!(
                            "{type_name}#{permission} follows unknown relation {relation:?}"
                        )));
                    },
                    _ => {},
                }
            }
        }
    }
    Ok(())
}

/// Compiles JSON manifests and builds [`GraphCache`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCompiler;

impl ModelCompiler for ManifestCompiler {
    fn compile(&self, body: &[u8]) -> Result<Model> {
        let doc: ManifestDoc =
            serde_json::from_slice(body).map_err(|e| compile_error(format!("malformed manifest: {e}")))?;
        let mut model = Model { version: doc.model.version, types: BTreeMap::new() };
        for (type_name, type_doc) in doc.types {
            check_name("type", &type_name)?;
            let mut def = ObjectTypeDef::default();
            for (relation, expr) in type_doc.relations {
                check_name("relation", &relation)?;
                let subjects = union(&expr).map(parse_subject).collect::<Result<Vec<_>>>()?;
                def.relations.insert(relation, RelationDef { subjects });
            }
            for (permission, expr) in type_doc.permissions {
                check_name("permission", &permission)?;
                let terms = union(&expr).map(parse_term).collect::<Result<Vec<_>>>()?;
                def.permissions.insert(permission, PermissionDef { union: terms });
            }
            model.types.insert(type_name, def);
        }
        resolve(&model)?;
        Ok(model)
    }

    fn load(&self, model: Model) -> Arc<dyn ModelCache> {
        Arc::new(GraphCache::new(model))
    }
}

/// Evaluates checks by walking stored relations.
#[derive(Debug, Clone)]
pub struct GraphCache {
    model: Model,
}

type Node = (String, String, String);

struct Walk<'a> {
    reader: &'a dyn RelationReader,
    visited: HashSet<Node>,
    trace: Option<Vec<String>>,
}

impl GraphCache {
    /// Wraps a compiled model.
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    fn holds(
        &self,
        walk: &mut Walk<'_>,
        object: (&str, &str),
        name: &str,
        subject: (&str, &str),
        depth: usize,
    ) -> Result<bool> {
        if depth > MAX_DEPTH {
            return Ok(false);
        }
        let node = (object.0.to_string(), object.1.to_string(), name.to_string());
        if !walk.visited.insert(node) {
            return Ok(false);
        }
        if let Some(trace) = walk.trace.as_mut() {
            trace.push(format!("{}:{}#{}", object.0, object.1, name));
        }
        let Some(def) = self.model.types.get(object.0) else {
            return Ok(false);
        };

        if let Some(permission) = def.permissions.get(name) {
            for term in &permission.union {
                let found = match term {
                    PermissionTerm::Relation { name } => {
                        self.holds(walk, object, name, subject, depth + 1)?
                    },
                    PermissionTerm::Arrow { relation, permission } => {
                        let mut found = false;
                        for rel in walk.reader.relations(object.0, object.1, relation)? {
                            let next = (rel.subject_type.as_str(), rel.subject_id.as_str());
                            if self.holds(walk, next, permission, subject, depth + 1)? {
                                found = true;
                                break;
                            }
                        }
                        found
                    },
                };
                if found {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        for rel in walk.reader.relations(object.0, object.1, name)? {
            if rel.subject_relation.is_empty() {
                if rel.subject_type == subject.0
                    && (rel.subject_id == subject.1 || rel.subject_id == WILDCARD)
                {
                    return Ok(true);
                }
                continue;
            }
            let next = (rel.subject_type.as_str(), rel.subject_id.as_str());
            if self.holds(walk, next, &rel.subject_relation, subject, depth + 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn expand(
        &self,
        reader: &dyn RelationReader,
        visited: &mut HashSet<Node>,
        object: (&str, &str),
        name: &str,
        target: (&str, &str),
        out: &mut BTreeSet<(String, String)>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH
            || !visited.insert((object.0.to_string(), object.1.to_string(), name.to_string()))
        {
            return Ok(());
        }
        let Some(def) = self.model.types.get(object.0) else {
            return Ok(());
        };
        if let Some(permission) = def.permissions.get(name) {
            for term in &permission.union {
                match term {
                    PermissionTerm::Relation { name } => {
                        self.expand(reader, visited, object, name, target, out, depth + 1)?;
                    },
                    PermissionTerm::Arrow { relation, permission } => {
                        for rel in reader.relations(object.0, object.1, relation)? {
                            let next = (rel.subject_type.as_str(), rel.subject_id.as_str());
                            self.expand(reader, visited, next, permission, target, out, depth + 1)?;
                        }
                    },
                }
            }
            return Ok(());
        }
        for rel in reader.relations(object.0, object.1, name)? {
            if rel.subject_type == target.0 && rel.subject_relation == target.1 {
                out.insert((rel.subject_type.clone(), rel.subject_id.clone()));
            }
            if !rel.subject_relation.is_empty() {
                let next = (rel.subject_type.as_str(), rel.subject_id.as_str());
                self.expand(reader, visited, next, &rel.subject_relation, target, out, depth + 1)?;
            }
        }
        Ok(())
    }

    fn declared(&self, object_type: &str, name: &str) -> bool {
        self.model.relation_exists(object_type, name) || self.model.permission_exists(object_type, name)
    }
}

impl ModelCache for GraphCache {
    fn model(&self) -> &Model {
        &self.model
    }

    fn check(&self, reader: &dyn RelationReader, request: &CheckRequest) -> Result<CheckResponse> {
        if !self.declared(&request.object_type, &request.relation) {
            return Ok(CheckResponse {
                check: false,
                trace: Vec::new(),
                error: Some(format!(
                    "{}#{} is not declared",
                    request.object_type, request.relation
                )),
            });
        }
        let mut walk =
            Walk { reader, visited: HashSet::new(), trace: request.trace.then(Vec::new) };
        let check = self.holds(
            &mut walk,
            (&request.object_type, &request.object_id),
            &request.relation,
            (&request.subject_type, &request.subject_id),
            0,
        )?;
        Ok(CheckResponse { check, trace: walk.trace.unwrap_or_default(), error: None })
    }

    fn graph(
        &self,
        reader: &dyn RelationReader,
        request: &GraphRequest,
    ) -> Result<Vec<ObjectIdentifier>> {
        if !self.declared(&request.object_type, &request.relation) {
            return Err(DirectoryError::ModelRejected {
                message: format!("{}#{} is not declared", request.object_type, request.relation),
            });
        }
        let mut out = BTreeSet::new();
        self.expand(
            reader,
            &mut HashSet::new(),
            (&request.object_type, &request.object_id),
            &request.relation,
            (&request.subject_type, &request.subject_relation),
            &mut out,
            0,
        )?;
        Ok(out
            .into_iter()
            .map(|(object_type, object_id)| ObjectIdentifier { object_type, object_id })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use reldir_test_utils::fixtures::{self, SAMPLE_MANIFEST};
    use reldir_types::Relation;

    use super::*;

    #[derive(Default)]
    struct MemReader {
        rels: HashMap<(String, String, String), Vec<Relation>>,
    }

    impl MemReader {
        fn add(&mut self, rel: Relation) {
            let key = (rel.object_type.clone(), rel.object_id.clone(), rel.relation.clone());
            self.rels.entry(key).or_default().push(rel);
        }
    }

    impl RelationReader for MemReader {
        fn relations(&self, t: &str, id: &str, relation: &str) -> Result<Vec<Relation>> {
            let key = (t.to_string(), id.to_string(), relation.to_string());
            Ok(self.rels.get(&key).cloned().unwrap_or_default())
        }
    }

    fn cache() -> Arc<dyn ModelCache> {
        let compiler = ManifestCompiler;
        compiler.load(compiler.compile(SAMPLE_MANIFEST.as_bytes()).expect("compile"))
    }

    fn check(cache: &dyn ModelCache, reader: &MemReader, object: (&str, &str), name: &str, user: &str) -> bool {
        let request = CheckRequest {
            object_type: object.0.into(),
            object_id: object.1.into(),
            relation: name.into(),
            subject_type: "user".into(),
            subject_id: user.into(),
            trace: false,
        };
        let response = cache.check(reader, &request).expect("check");
        assert!(response.error.is_none(), "{:?}", response.error);
        response.check
    }

    #[test]
    fn test_compile_sample_manifest() {
        let model = ManifestCompiler.compile(SAMPLE_MANIFEST.as_bytes()).expect("compile");
        assert_eq!(model.version, 3);
        assert!(model.subject_allowed("group", "member", "group", "member"));
        assert!(model.permission_exists("document", "can_view"));
        let viewer = &model.types["document"].relations["viewer"];
        assert!(viewer.subjects.iter().any(|s| s.wildcard));
    }

    #[test]
    fn test_compile_rejects_dangling_names() {
        for body in [
            r#"{"types":{"doc":{"relations":{"viewer":"user"}}}}"#,
            r#"{"types":{"user":{},"doc":{"permissions":{"can_view":"viewer"}}}}"#,
            r#"{"types":{"user":{},"doc":{"relations":{"owner":"user"},"permissions":{"p":"parent->p"}}}}"#,
            r#"{"types":{"user":{},"group":{"relations":{"member":"user | group#owner"}}}}"#,
            "not json",
        ] {
            assert!(ManifestCompiler.compile(body.as_bytes()).is_err(), "{body} should fail");
        }
    }

    #[test]
    fn test_direct_and_nested_membership() {
        let cache = cache();
        let mut reader = MemReader::default();
        reader.add(fixtures::relation(("group", "eng"), "member", ("user", "alice")));
        reader.add(fixtures::subject_set(("group", "all"), "member", ("group", "eng"), "member"));
        reader.add(fixtures::subject_set(("folder", "f1"), "viewer", ("group", "all"), "member"));

        assert!(check(cache.as_ref(), &reader, ("group", "eng"), "member", "alice"));
        assert!(check(cache.as_ref(), &reader, ("group", "all"), "member", "alice"));
        assert!(check(cache.as_ref(), &reader, ("folder", "f1"), "can_view", "alice"));
        assert!(!check(cache.as_ref(), &reader, ("folder", "f1"), "can_view", "bob"));
    }

    #[test]
    fn test_arrow_and_wildcard() {
        let cache = cache();
        let mut reader = MemReader::default();
        reader.add(fixtures::relation(("folder", "f1"), "owner", ("user", "alice")));
        reader.add(fixtures::relation(("document", "d1"), "parent", ("folder", "f1")));
        reader.add(fixtures::relation(("document", "d2"), "viewer", ("user", WILDCARD)));

        assert!(check(cache.as_ref(), &reader, ("document", "d1"), "can_view", "alice"));
        assert!(!check(cache.as_ref(), &reader, ("document", "d1"), "can_view", "bob"));
        assert!(check(cache.as_ref(), &reader, ("document", "d2"), "can_view", "anyone"));
    }

    #[test]
    fn test_cycles_terminate() {
        let cache = cache();
        let mut reader = MemReader::default();
        reader.add(fixtures::subject_set(("group", "a"), "member", ("group", "b"), "member"));
        reader.add(fixtures::subject_set(("group", "b"), "member", ("group", "a"), "member"));
        assert!(!check(cache.as_ref(), &reader, ("group", "a"), "member", "alice"));
    }

    #[test]
    fn test_undeclared_check_reports_error() {
        let cache = cache();
        let response = cache
            .check(&MemReader::default(), &CheckRequest {
                object_type: "folder".into(),
                object_id: "f1".into(),
                relation: "nope".into(),
                subject_type: "user".into(),
                subject_id: "alice".into(),
                trace: false,
            })
            .expect("check");
        assert!(!response.check);
        assert!(response.error.is_some());
    }

    #[test]
    fn test_graph_collects_nested_users() {
        let cache = cache();
        let mut reader = MemReader::default();
        reader.add(fixtures::relation(("group", "eng"), "member", ("user", "alice")));
        reader.add(fixtures::relation(("group", "eng"), "member", ("user", "bob")));
        reader.add(fixtures::subject_set(("folder", "f1"), "viewer", ("group", "eng"), "member"));
        reader.add(fixtures::relation(("folder", "f1"), "owner", ("user", "carol")));

        let subjects = cache
            .graph(&reader, &GraphRequest {
                object_type: "folder".into(),
                object_id: "f1".into(),
                relation: "can_view".into(),
                subject_type: "user".into(),
                subject_relation: String::new(),
            })
            .expect("graph");
        let ids: Vec<&str> = subjects.iter().map(|s| s.object_id.as_str()).collect();
        assert_eq!(ids, ["alice", "bob", "carol"]);
    }

    #[test]
    fn test_trace_records_visited_nodes() {
        let cache = cache();
        let mut reader = MemReader::default();
        reader.add(fixtures::relation(("group", "eng"), "member", ("user", "alice")));
        let response = cache
            .check(&reader, &CheckRequest {
                object_type: "group".into(),
                object_id: "eng".into(),
                relation: "member".into(),
                subject_type: "user".into(),
                subject_id: "alice".into(),
                trace: true,
            })
            .expect("check");
        assert!(response.check);
        assert_eq!(response.trace, ["group:eng#member"]);
    }
}
