//! Batch import inside one write transaction.

use reldir_types::{ErrorCode, Object, ObjectIdentifier, Relation, RelationIdentifier};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    directory::Directory,
    error::{DirectoryError, Result},
};

/// One entry of an import batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOp {
    SetObject(Object),
    DeleteObject { id: ObjectIdentifier, with_relations: bool },
    SetRelation(Relation),
    DeleteRelation(RelationIdentifier),
}

impl ImportOp {
    fn is_object(&self) -> bool {
        matches!(self, Self::SetObject(_) | Self::DeleteObject { .. })
    }
}

/// Per-kind tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounters {
    pub set: u64,
    pub unchanged: u64,
    pub deleted: u64,
    pub errors: u64,
}

/// An entry that was rejected while the batch went on.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFailure {
    /// Position of the entry in the batch.
    pub index: usize,
    pub code: ErrorCode,
    pub message: String,
}

/// Result of an import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub objects: ImportCounters,
    pub relations: ImportCounters,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    /// Entries processed, including failed ones.
    pub fn total(&self) -> u64 {
        let sum = |c: &ImportCounters| c.set + c.unchanged + c.deleted + c.errors;
        sum(&self.objects) + sum(&self.relations)
    }
}

impl Directory {
    /// Applies `ops` in order inside one write transaction.
    ///
    /// Entry errors such as validation or model rejections are recorded in
    /// the report and the batch continues. Store failures abort the batch.
    /// Cancellation is checked before each entry; a cancelled import is
    /// rolled back entirely.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when `cancel` fires, or the first fatal error.
    #[instrument(skip_all, fields(count = ops.len()))]
    pub fn import(&self, ops: Vec<ImportOp>, cancel: &CancellationToken) -> Result<ImportReport> {
        let txn = self.store().write()?;
        let mut report = ImportReport::default();

        for (index, op) in ops.into_iter().enumerate() {
            if cancel.is_cancelled() {
                let applied = report.total();
                warn!(applied, "Import cancelled, rolling back");
                txn.abort()?;
                return Err(DirectoryError::Cancelled { applied });
            }

            let is_object = op.is_object();
            let counters = if is_object { &mut report.objects } else { &mut report.relations };
            let outcome = match op {
                ImportOp::SetObject(obj) => self.set_object_in(&txn, obj).map(|o| Applied::Set(o.written)),
                ImportOp::DeleteObject { id, with_relations } => self
                    .delete_object_in(&txn, &id, "", with_relations)
                    .map(|o| Applied::Deleted(o.existed)),
                ImportOp::SetRelation(rel) => {
                    self.set_relation_in(&txn, rel).map(|o| Applied::Set(o.written))
                },
                ImportOp::DeleteRelation(id) => {
                    self.delete_relation_in(&txn, &id, "").map(Applied::Deleted)
                },
            };

            match outcome {
                Ok(Applied::Set(true)) => counters.set += 1,
                Ok(Applied::Set(false)) => counters.unchanged += 1,
                Ok(Applied::Deleted(true)) => counters.deleted += 1,
                Ok(Applied::Deleted(false)) => counters.unchanged += 1,
                Err(e) if e.is_fatal() => {
                    warn!(index, error = %e, "Import aborted");
                    return Err(e);
                },
                Err(e) => {
                    counters.errors += 1;
                    report.failures.push(ImportFailure { index, code: e.code(), message: e.to_string() });
                },
            }
        }

        txn.commit()?;
        info!(
            objects_set = report.objects.set,
            relations_set = report.relations.set,
            deleted = report.objects.deleted + report.relations.deleted,
            errors = report.failures.len(),
            "Import committed"
        );
        Ok(report)
    }
}

enum Applied {
    Set(bool),
    Deleted(bool),
}
