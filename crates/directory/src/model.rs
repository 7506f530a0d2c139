//! Model-cache seam.
//!
//! The directory persists the manifest body and the compiled [`Model`], and
//! delegates compilation and permission evaluation to a [`ModelCompiler`]
//! and the [`ModelCache`] it builds. The live cache is swapped atomically on
//! manifest change; readers keep the cache they loaded.

use std::{fmt::Debug, sync::Arc};

use reldir_store::{
    ReadTxn, buckets,
    keys::{self, Direction},
    typed,
};
use reldir_types::{
    CheckRequest, CheckResponse, GraphRequest, Model, ObjectIdentifier, Relation, RelationFilter,
    Stats,
};

use crate::error::{DirectoryError, Result};

/// Relation lookups a model cache needs while evaluating.
pub trait RelationReader {
    /// Relations `object_type:object_id#relation@*`, in key order.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    fn relations(&self, object_type: &str, object_id: &str, relation: &str) -> Result<Vec<Relation>>;
}

/// [`RelationReader`] over a store transaction.
#[derive(Debug)]
pub struct TxnReader<'t, T: ReadTxn + ?Sized> {
    txn: &'t T,
}

impl<'t, T: ReadTxn + ?Sized> TxnReader<'t, T> {
    /// Wraps a transaction.
    pub fn new(txn: &'t T) -> Self {
        Self { txn }
    }
}

impl<T: ReadTxn + ?Sized> RelationReader for TxnReader<'_, T> {
    fn relations(&self, object_type: &str, object_id: &str, relation: &str) -> Result<Vec<Relation>> {
        let filter = RelationFilter::for_object(object_type, object_id).with_relation(relation);
        let prefix = keys::relation_prefix(Direction::ObjectToSubject, &filter);
        let found = typed::scan::<Relation, _>(self.txn, &buckets::relations_obj(), &prefix)?;
        Ok(found.into_iter().map(|(_, rel)| rel).collect())
    }
}

/// Compiled model plus evaluation.
pub trait ModelCache: Send + Sync + Debug {
    /// The compiled model.
    fn model(&self) -> &Model;

    /// Evaluates a relation or permission check.
    ///
    /// # Errors
    ///
    /// Returns storage errors from `reader`. Requests the model cannot
    /// evaluate come back as a response with `error` set.
    fn check(&self, reader: &dyn RelationReader, request: &CheckRequest) -> Result<CheckResponse>;

    /// Lists every subject of the requested type reachable through the
    /// relation or permission.
    ///
    /// # Errors
    ///
    /// Returns `ModelRejected` for undeclared names, or storage errors.
    fn graph(&self, reader: &dyn RelationReader, request: &GraphRequest)
    -> Result<Vec<ObjectIdentifier>>;

    /// Whether `next` can replace this model given the data in use.
    ///
    /// # Errors
    ///
    /// Returns `ModelIncompatible` listing what `next` would orphan.
    fn can_update(&self, next: &Model, stats: &Stats) -> Result<()> {
        let problems = next.incompatibilities(stats);
        if problems.is_empty() { Ok(()) } else { Err(DirectoryError::ModelIncompatible { problems }) }
    }

    fn object_exists(&self, object_type: &str) -> bool {
        self.model().object_exists(object_type)
    }

    fn relation_exists(&self, object_type: &str, relation: &str) -> bool {
        self.model().relation_exists(object_type, relation)
    }

    fn permission_exists(&self, object_type: &str, permission: &str) -> bool {
        self.model().permission_exists(object_type, permission)
    }
}

/// Turns manifest bodies into models and models into caches.
pub trait ModelCompiler: Send + Sync + Debug {
    /// Parses and validates a manifest body.
    ///
    /// # Errors
    ///
    /// Returns `ModelCompile` describing the first problem found.
    fn compile(&self, body: &[u8]) -> Result<Model>;

    /// Builds an evaluation cache for a compiled model.
    fn load(&self, model: Model) -> Arc<dyn ModelCache>;
}

/// Model currently served by a directory.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Etag of the manifest body the model was compiled from.
    pub etag: String,
    /// Evaluation cache.
    pub cache: Arc<dyn ModelCache>,
}

impl LoadedModel {
    /// The compiled model.
    pub fn model(&self) -> &Model {
        self.cache.model()
    }

    /// Rejects writes the model does not declare.
    ///
    /// # Errors
    ///
    /// Returns `ModelRejected` naming the undeclared type or relation.
    pub fn validate_object(&self, object_type: &str) -> Result<()> {
        if self.cache.object_exists(object_type) {
            Ok(())
        } else {
            Err(DirectoryError::ModelRejected {
                message: format!("object type {object_type:?} is not declared"),
            })
        }
    }

    /// Rejects relations whose object type, relation or subject type the
    /// model does not declare.
    ///
    /// # Errors
    ///
    /// Returns `ModelRejected` naming the first undeclared part.
    pub fn validate_relation(&self, rel: &Relation) -> Result<()> {
        self.validate_object(&rel.object_type)?;
        if !self.cache.relation_exists(&rel.object_type, &rel.relation) {
            return Err(DirectoryError::ModelRejected {
                message: format!("relation {}#{} is not declared", rel.object_type, rel.relation),
            });
        }
        if !self.cache.object_exists(&rel.subject_type) {
            return Err(DirectoryError::ModelRejected {
                message: format!("subject type {:?} is not declared", rel.subject_type),
            });
        }
        Ok(())
    }
}
