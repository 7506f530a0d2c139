//! The directory service.
//!
//! [`Directory`] owns the store handle, the live model and a key buffer
//! pool. It is built once by the caller and shared by reference. Every write
//! entry point has an `_in` form taking an open write transaction, used by
//! import and sync to apply many entries atomically.

use std::{collections::BTreeMap, sync::Arc};

use arc_swap::ArcSwapOption;
use reldir_store::{
    KeyBufferPool, Page, PageOptions, ReadTxn, Store, WriteTxn, migrate, migrate::MigrationReport,
};
use reldir_types::{
    CheckRequest, CheckResponse, GraphRequest, Manifest, ManifestMetadata, Object, ObjectIdentifier,
    Relation, RelationFilter, RelationIdentifier, Stats, body_etag, config::DirectoryConfig,
    validation,
};
use snafu::ResultExt;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ConfigSnafu, DirectoryError, Result, ValidationSnafu},
    manifest::ManifestStore,
    metadata::{self, SetOutcome, Stamped},
    metrics::{self, WriteOutcome},
    model::{LoadedModel, ModelCompiler, TxnReader},
    object::{DeleteOutcome, ObjectStore},
    relation::RelationStore,
    stats,
};

/// An object with the relations it holds as the object side.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectWithRelations {
    pub object: Object,
    /// Empty unless requested.
    pub relations: Page<Relation>,
}

/// A relation with its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationWithObjects {
    pub relation: Relation,
    /// Object side, when requested and present.
    pub object: Option<Object>,
    /// Subject side, when requested and present.
    pub subject: Option<Object>,
}

/// A page of relations plus the objects they reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationsPage {
    pub relations: Page<Relation>,
    /// Endpoints keyed by `type:id`; empty unless requested.
    pub objects: BTreeMap<String, Object>,
}

/// Relationship directory over an embedded store.
pub struct Directory {
    store: Store,
    config: DirectoryConfig,
    compiler: Arc<dyn ModelCompiler>,
    model: ArcSwapOption<LoadedModel>,
    pool: KeyBufferPool,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("store", &self.store)
            .field("model_etag", &(*self.model.load()).as_ref().map(|m| m.etag.clone()))
            .finish_non_exhaustive()
    }
}

impl Directory {
    /// Opens the store at `config.store.db_path`, migrating it as configured,
    /// and loads the persisted model.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid settings, store open and migration
    /// errors, or `ModelCompile` if the stored manifest no longer compiles.
    #[instrument(skip_all, fields(path = %config.store.db_path.display()))]
    pub fn open(config: DirectoryConfig, compiler: Arc<dyn ModelCompiler>) -> Result<Self> {
        config.validate().context(ConfigSnafu)?;
        let store = Store::open(&config.store)?;
        Self::with_store(store, config, compiler)
    }

    /// Directory over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns store errors from initialization.
    pub fn in_memory(compiler: Arc<dyn ModelCompiler>) -> Result<Self> {
        Self::with_store(Store::in_memory()?, DirectoryConfig::default(), compiler)
    }

    /// Wraps an already opened store.
    ///
    /// # Errors
    ///
    /// Returns `SchemaUpdateRequired`/`SchemaVersionHigher` or migration
    /// errors, and model load errors.
    pub fn with_store(
        store: Store,
        config: DirectoryConfig,
        compiler: Arc<dyn ModelCompiler>,
    ) -> Result<Self> {
        let report = migrate::ensure(&store, config.store.auto_migrate)?;
        log_migration(&report);
        let directory = Self {
            store,
            config,
            compiler,
            model: ArcSwapOption::empty(),
            pool: KeyBufferPool::default(),
        };
        directory.reload_model()?;
        Ok(directory)
    }

    /// Underlying store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Model currently in use, if a manifest is loaded.
    pub fn model(&self) -> Option<Arc<LoadedModel>> {
        self.model.load_full()
    }

    pub(crate) fn loaded_model(&self) -> Result<Arc<LoadedModel>> {
        self.model().ok_or(DirectoryError::ModelNotLoaded)
    }

    fn max_page_size(&self) -> u32 {
        self.config.store.max_page_size
    }

    /// Reloads the model from the stored manifest. Returns whether the live
    /// model changed.
    ///
    /// # Errors
    ///
    /// Returns store errors, or `ModelCompile` when the body has no stored
    /// model and does not compile.
    pub fn reload_model(&self) -> Result<bool> {
        let txn = self.store.read()?;
        let Some(metadata) = ManifestStore::metadata(&txn)? else {
            let had_model = self.model.swap(None).is_some();
            metrics::record_model_reload(had_model);
            return Ok(had_model);
        };
        if (*self.model.load()).as_ref().is_some_and(|m| m.etag == metadata.etag) {
            metrics::record_model_reload(false);
            return Ok(false);
        }
        let model = match ManifestStore::model(&txn)? {
            Some(model) => model,
            None => {
                let body = ManifestStore::get(&txn)?
                    .and_then(|m| m.body)
                    .map(|b| b.data)
                    .unwrap_or_default();
                self.compiler.compile(&body)?
            },
        };
        self.swap_model(metadata.etag, model);
        Ok(true)
    }

    fn swap_model(&self, etag: String, model: reldir_types::Model) {
        let cache = self.compiler.load(model);
        info!(etag = %etag, types = cache.model().types.len(), "Loaded model");
        self.model.store(Some(Arc::new(LoadedModel { etag, cache })));
        metrics::record_model_reload(true);
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    fn validate_object(&self, obj: &Object) -> Result<()> {
        validation::validate_object(obj, &self.config.validation)
            .context(ValidationSnafu { kind: Object::KIND })?;
        if let Some(model) = &*self.model.load() {
            model.validate_object(&obj.r#type)?;
        }
        Ok(())
    }

    fn validate_relation(&self, rel: &Relation) -> Result<()> {
        validation::validate_relation(rel, &self.config.validation)
            .context(ValidationSnafu { kind: Relation::KIND })?;
        if let Some(model) = &*self.model.load() {
            model.validate_relation(rel)?;
        }
        Ok(())
    }

    fn validate_object_id(&self, id: &ObjectIdentifier) -> Result<()> {
        validation::validate_object_identifier(id, &self.config.validation)
            .context(ValidationSnafu { kind: Object::KIND })
    }

    fn validate_relation_id(&self, id: &RelationIdentifier) -> Result<()> {
        validation::validate_relation_identifier(id, &self.config.validation)
            .context(ValidationSnafu { kind: Relation::KIND })
    }

    // ---------------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------------

    /// Reads one object, optionally with a page of its relations.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the object does not exist.
    pub fn get_object(
        &self,
        id: &ObjectIdentifier,
        with_relations: bool,
        page: &PageOptions,
    ) -> Result<ObjectWithRelations> {
        self.validate_object_id(id)?;
        let txn = self.store.read()?;
        let object = ObjectStore::get(&txn, &self.pool, id)?;
        let relations = if with_relations {
            let filter = RelationFilter::for_object(&id.object_type, &id.object_id);
            RelationStore::query(&txn, &filter, page, self.max_page_size())?
        } else {
            Page::default()
        };
        Ok(ObjectWithRelations { object, relations })
    }

    /// One page of objects; an empty `object_type` lists every type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPageToken` for a foreign token.
    pub fn get_objects(&self, object_type: &str, page: &PageOptions) -> Result<Page<Object>> {
        let txn = self.store.read()?;
        ObjectStore::list(&txn, object_type, page, self.max_page_size())
    }

    /// Reads several objects in one snapshot, in request order.
    ///
    /// # Errors
    ///
    /// Fails with `KeyNotFound` on the first missing object.
    pub fn get_object_many(&self, ids: &[ObjectIdentifier]) -> Result<Vec<Object>> {
        let txn = self.store.read()?;
        ids.iter()
            .map(|id| {
                self.validate_object_id(id)?;
                ObjectStore::get(&txn, &self.pool, id)
            })
            .collect()
    }

    /// Creates or updates an object.
    ///
    /// A non-empty `obj.etag` must equal the stored etag.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `ModelRejected`, `HashMismatch` or store errors.
    #[instrument(skip_all, fields(object_type = %obj.r#type, object_id = %obj.id))]
    pub fn set_object(&self, obj: Object) -> Result<SetOutcome<Object>> {
        self.store.update(|txn| self.set_object_in(txn, obj))
    }

    /// [`Directory::set_object`] inside an open transaction.
    ///
    /// # Errors
    ///
    /// As [`Directory::set_object`].
    pub fn set_object_in<T: WriteTxn + ?Sized>(&self, txn: &T, obj: Object) -> Result<SetOutcome<Object>> {
        let result = self
            .validate_object(&obj)
            .and_then(|()| ObjectStore::set(txn, &self.pool, obj, metadata::now()));
        record(Object::KIND, &result, |o| WriteOutcome::for_set(o.written));
        result
    }

    /// Deletes an object; absent objects are not an error.
    ///
    /// # Errors
    ///
    /// Returns `HashMismatch` when `expected_etag` is stale, or store errors.
    #[instrument(skip_all, fields(object_type = %id.object_type, object_id = %id.object_id))]
    pub fn delete_object(
        &self,
        id: &ObjectIdentifier,
        expected_etag: &str,
        with_relations: bool,
    ) -> Result<DeleteOutcome> {
        self.store.update(|txn| self.delete_object_in(txn, id, expected_etag, with_relations))
    }

    /// [`Directory::delete_object`] inside an open transaction.
    ///
    /// # Errors
    ///
    /// As [`Directory::delete_object`].
    pub fn delete_object_in<T: WriteTxn + ?Sized>(
        &self,
        txn: &T,
        id: &ObjectIdentifier,
        expected_etag: &str,
        with_relations: bool,
    ) -> Result<DeleteOutcome> {
        let result = self.validate_object_id(id).and_then(|()| {
            ObjectStore::delete(txn, &self.pool, id, expected_etag, with_relations)
        });
        record(Object::KIND, &result, |_| WriteOutcome::Deleted);
        if let Ok(outcome) = &result {
            if outcome.relations > 0 {
                debug!(relations = outcome.relations, "Cascaded object delete");
            }
        }
        result
    }

    // ---------------------------------------------------------------------
    // Relations
    // ---------------------------------------------------------------------

    /// Reads the relation matching every field of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless both endpoints and the relation are
    /// named, `KeyNotFound` when nothing matches and `MultipleResults` when
    /// an empty subject relation matches several tuples.
    pub fn get_relation(&self, id: &RelationIdentifier, with_objects: bool) -> Result<RelationWithObjects> {
        self.validate_relation_id(id)?;
        let txn = self.store.read()?;
        let relation = RelationStore::find(&txn, id)?;
        let (object, subject) = if with_objects {
            (
                ObjectStore::try_get(&txn, &self.pool, &relation.object_type, &relation.object_id)?,
                ObjectStore::try_get(&txn, &self.pool, &relation.subject_type, &relation.subject_id)?,
            )
        } else {
            (None, None)
        };
        Ok(RelationWithObjects { relation, object, subject })
    }

    /// One page of relations matching `filter`.
    ///
    /// A filter that fully names neither endpoint scans a range of the
    /// object-primary index and filters the rest in memory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPageToken` for a foreign token, or store errors.
    pub fn get_relations(
        &self,
        filter: &RelationFilter,
        page: &PageOptions,
        with_objects: bool,
    ) -> Result<RelationsPage> {
        let txn = self.store.read()?;
        let relations = RelationStore::query(&txn, filter, page, self.max_page_size())?;
        let mut objects = BTreeMap::new();
        if with_objects {
            for rel in &relations.results {
                for (t, id) in [(&rel.object_type, &rel.object_id), (&rel.subject_type, &rel.subject_id)] {
                    let key = format!("{t}:{id}");
                    if objects.contains_key(&key) {
                        continue;
                    }
                    if let Some(obj) = ObjectStore::try_get(&txn, &self.pool, t, id)? {
                        objects.insert(key, obj);
                    }
                }
            }
        }
        Ok(RelationsPage { relations, objects })
    }

    /// Creates or updates a relation in both indexes.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `ModelRejected`, `HashMismatch` or store errors.
    #[instrument(skip_all, fields(object_type = %rel.object_type, relation = %rel.relation, subject_type = %rel.subject_type))]
    pub fn set_relation(&self, rel: Relation) -> Result<SetOutcome<Relation>> {
        self.store.update(|txn| self.set_relation_in(txn, rel))
    }

    /// [`Directory::set_relation`] inside an open transaction.
    ///
    /// # Errors
    ///
    /// As [`Directory::set_relation`].
    pub fn set_relation_in<T: WriteTxn + ?Sized>(
        &self,
        txn: &T,
        rel: Relation,
    ) -> Result<SetOutcome<Relation>> {
        let result = self
            .validate_relation(&rel)
            .and_then(|()| RelationStore::set(txn, &self.pool, rel, metadata::now()));
        record(Relation::KIND, &result, |o| WriteOutcome::for_set(o.written));
        result
    }

    /// Deletes a relation from both indexes. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `HashMismatch` when `expected_etag` is stale, or store errors.
    #[instrument(skip_all, fields(object_type = %id.object_type, relation = %id.relation))]
    pub fn delete_relation(&self, id: &RelationIdentifier, expected_etag: &str) -> Result<bool> {
        self.store.update(|txn| self.delete_relation_in(txn, id, expected_etag))
    }

    /// [`Directory::delete_relation`] inside an open transaction.
    ///
    /// # Errors
    ///
    /// As [`Directory::delete_relation`].
    pub fn delete_relation_in<T: WriteTxn + ?Sized>(
        &self,
        txn: &T,
        id: &RelationIdentifier,
        expected_etag: &str,
    ) -> Result<bool> {
        let result = self
            .validate_relation_id(id)
            .and_then(|()| RelationStore::delete(txn, &self.pool, id, expected_etag));
        record(Relation::KIND, &result, |_| WriteOutcome::Deleted);
        result
    }

    // ---------------------------------------------------------------------
    // Manifest
    // ---------------------------------------------------------------------

    /// Stored manifest metadata and body.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn get_manifest(&self) -> Result<Option<Manifest>> {
        ManifestStore::get(&self.store.read()?)
    }

    /// Compiles and stores a manifest body, then swaps the live model.
    ///
    /// A body whose etag matches the stored one is a no-op. The new model
    /// must accept every type, relation and subject currently in use.
    ///
    /// # Errors
    ///
    /// Returns `ModelCompile`, `ModelIncompatible` or store errors; the
    /// stored manifest is unchanged on error.
    #[instrument(skip_all, fields(bytes = body.len()))]
    pub fn set_manifest(&self, body: &[u8]) -> Result<ManifestMetadata> {
        let etag = body_etag(body);
        let txn = self.store.write()?;
        if let Some(current) = ManifestStore::metadata(&txn)? {
            if current.etag == etag {
                debug!(etag = %etag, "Manifest unchanged");
                return Ok(current);
            }
        }

        let next = self.compiler.compile(body)?;
        let stats = stats::collect(&txn)?;
        let cache = match self.model() {
            Some(current) => current.cache.clone(),
            None => self.compiler.load(next.clone()),
        };
        cache.can_update(&next, &stats).inspect_err(|e| warn!(error = %e, "Manifest rejected"))?;

        let metadata = ManifestStore::put(&txn, body, &next, metadata::now())?;
        txn.commit()?;
        self.swap_model(metadata.etag.clone(), next);
        Ok(metadata)
    }

    /// Removes the manifest and unloads the model. Returns whether one was
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn delete_manifest(&self) -> Result<bool> {
        let existed = self.store.update(|txn| ManifestStore::delete(txn))?;
        self.model.store(None);
        if existed {
            info!("Deleted manifest");
        }
        Ok(existed)
    }

    // ---------------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------------

    /// Evaluates one check against the live model.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotLoaded` without a manifest, or store errors.
    pub fn check(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let model = self.loaded_model()?;
        let txn = self.store.read()?;
        model.cache.check(&TxnReader::new(&txn), request)
    }

    /// Subjects reachable through a relation or permission.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotLoaded`, `ModelRejected` or store errors.
    pub fn graph(&self, request: &GraphRequest) -> Result<Vec<ObjectIdentifier>> {
        let model = self.loaded_model()?;
        let txn = self.store.read()?;
        model.cache.graph(&TxnReader::new(&txn), request)
    }

    /// Object and relation counts from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns store errors, or `InvalidKey` for a malformed stored key.
    pub fn stats(&self) -> Result<Stats> {
        stats::collect(&self.store.read()?)
    }

    /// Stats inside an open transaction.
    ///
    /// # Errors
    ///
    /// As [`Directory::stats`].
    pub fn stats_in<T: ReadTxn + ?Sized>(&self, txn: &T) -> Result<Stats> {
        stats::collect(txn)
    }
}

fn record<T>(kind: &'static str, result: &Result<T>, outcome: impl FnOnce(&T) -> WriteOutcome) {
    let outcome = match result {
        Ok(value) => outcome(value),
        Err(_) => WriteOutcome::Error,
    };
    metrics::record_write(kind, outcome);
}

fn log_migration(report: &MigrationReport) {
    match report.from {
        None => info!(version = %report.to, "Initialized store"),
        Some(_) if report.is_noop() => debug!(version = %report.to, "Store schema current"),
        Some(from) => info!(
            from = %from,
            to = %report.to,
            steps = report.applied.len(),
            backups = report.backups.len(),
            "Migrated store"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use reldir_test_utils::fixtures::{self, MANIFEST_WITHOUT_DOCUMENTS, SAMPLE_MANIFEST};

    use super::*;
    use crate::graph::ManifestCompiler;

    fn directory() -> Directory {
        Directory::in_memory(Arc::new(ManifestCompiler)).expect("directory")
    }

    fn with_model() -> Directory {
        let dir = directory();
        dir.set_manifest(SAMPLE_MANIFEST.as_bytes()).expect("manifest");
        dir
    }

    #[test]
    fn test_no_model_accepts_any_type() {
        let dir = directory();
        assert!(dir.model().is_none());
        dir.set_object(fixtures::object("anything", "x")).expect("set");
    }

    #[test]
    fn test_model_rejects_undeclared_types() {
        let dir = with_model();
        let err = dir.set_object(fixtures::object("device", "d1")).unwrap_err();
        assert!(matches!(err, DirectoryError::ModelRejected { .. }));

        let rel = fixtures::relation(("group", "eng"), "owner", ("user", "x"));
        assert!(matches!(dir.set_relation(rel).unwrap_err(), DirectoryError::ModelRejected { .. }));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let dir = directory();
        let err = dir.set_object(fixtures::object("user", "a\u{1f}b")).unwrap_err();
        assert!(matches!(err, DirectoryError::Validation { kind: "object", .. }));
    }

    #[test]
    fn test_set_manifest_is_idempotent() {
        let dir = directory();
        let first = dir.set_manifest(SAMPLE_MANIFEST.as_bytes()).expect("first");
        let etag = dir.model().expect("loaded").etag.clone();
        let second = dir.set_manifest(SAMPLE_MANIFEST.as_bytes()).expect("second");
        assert_eq!(first, second);
        assert_eq!(etag, first.etag);
        assert!(!dir.reload_model().expect("reload"));
    }

    #[test]
    fn test_incompatible_manifest_rejected() {
        let dir = with_model();
        dir.set_object(fixtures::object("document", "d1")).expect("set");
        let err = dir.set_manifest(MANIFEST_WITHOUT_DOCUMENTS.as_bytes()).unwrap_err();
        assert!(matches!(err, DirectoryError::ModelIncompatible { .. }));
        let stored = dir.get_manifest().expect("get").expect("stored");
        assert_eq!(stored.body.expect("body").data, SAMPLE_MANIFEST.as_bytes());
    }

    #[test]
    fn test_delete_manifest_unloads_model() {
        let dir = with_model();
        assert!(dir.delete_manifest().expect("delete"));
        assert!(dir.model().is_none());
        assert!(matches!(
            dir.check(&CheckRequest::default()).unwrap_err(),
            DirectoryError::ModelNotLoaded
        ));
    }

    #[test]
    fn test_check_reads_stored_relations() {
        let dir = with_model();
        dir.set_relation(fixtures::relation(("folder", "f1"), "owner", ("user", "alice")))
            .expect("owner");
        dir.set_relation(fixtures::relation(("document", "d1"), "parent", ("folder", "f1")))
            .expect("parent");
        let response = dir
            .check(&CheckRequest {
                object_type: "document".into(),
                object_id: "d1".into(),
                relation: "can_view".into(),
                subject_type: "user".into(),
                subject_id: "alice".into(),
                trace: false,
            })
            .expect("check");
        assert!(response.check);
    }

    #[test]
    fn test_get_relations_with_objects() {
        let dir = directory();
        dir.set_object(fixtures::object("group", "A")).expect("group");
        dir.set_object(fixtures::object("user", "X")).expect("user");
        dir.set_relation(fixtures::relation(("group", "A"), "member", ("user", "X")))
            .expect("relation");
        let page = dir
            .get_relations(&RelationFilter::for_object("group", "A"), &PageOptions::default(), true)
            .expect("relations");
        assert_eq!(page.relations.results.len(), 1);
        assert_eq!(page.objects.keys().collect::<Vec<_>>(), ["group:A", "user:X"]);
    }

    #[test]
    fn test_get_object_many_fails_on_missing() {
        let dir = directory();
        dir.set_object(fixtures::object("user", "a")).expect("set");
        let ids = [
            ObjectIdentifier { object_type: "user".into(), object_id: "a".into() },
            ObjectIdentifier { object_type: "user".into(), object_id: "b".into() },
        ];
        assert_eq!(dir.get_object_many(&ids[..1]).expect("one").len(), 1);
        assert!(dir.get_object_many(&ids).unwrap_err().is_not_found());
    }
}
