//! Producer/subscriber sync pipeline.
//!
//! ```text
//!  remote export ──► producer ──(bounded channel)──► subscriber ──► write txn
//!                      │                                  │
//!                      └── key filter (diff) ──verdict──► difference pass ──► commit
//! ```
//!
//! The producer reads the remote stream on the async runtime, records each
//! key in the filter when diffing, and forwards messages. The subscriber
//! runs on a blocking thread and applies every message inside one write
//! transaction through the same handlers as direct writes. Once the stream
//! is drained the subscriber waits for the producer's verdict: on success
//! it runs the difference pass and commits, otherwise it rolls back.

use std::{path::PathBuf, sync::Arc, time::Instant};

use futures::StreamExt;
use prost_types::Timestamp;
use reldir_directory::{Directory, DirectoryError};
use reldir_store::{
    Cursor, Direction, Path, ReadTxn, WriteTransaction, buckets,
    keys::{self, RelationTuple},
};
use reldir_types::{
    ErrorCode, ExportOption, ExportResponse, config::SyncConfig, convert, export_response::Msg,
};
use snafu::ResultExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ConfigSnafu, Result, SyncError},
    filter::{KeyFilter, expected_entries},
    manifest, metrics,
    mode::Mode,
    remote::{ExportStream, RemoteDirectory},
    watermark::{self, Watermark},
};

/// Counters for one entry kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryCounters {
    /// Messages received from the remote.
    pub received: u64,
    /// Entries whose content changed locally.
    pub written: u64,
    /// Entries already identical locally.
    pub unchanged: u64,
    /// Entries rejected by validation or the model.
    pub errors: u64,
    /// Local entries removed by the difference pass.
    pub deleted: u64,
}

/// A rejected entry. The run continues past these.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryError {
    pub stage: &'static str,
    pub kind: &'static str,
    pub key: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub objects: EntryCounters,
    pub relations: EntryCounters,
    pub manifest_changed: bool,
    /// Watermark written by this run.
    pub watermark: Option<Watermark>,
    pub failures: Vec<EntryError>,
}

/// Syncs a local directory from a remote one.
pub struct Syncer<R> {
    directory: Arc<Directory>,
    remote: R,
    config: SyncConfig,
    watermark_path: Option<PathBuf>,
}

impl<R: std::fmt::Debug> std::fmt::Debug for Syncer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Syncer")
            .field("remote", &self.remote)
            .field("config", &self.config)
            .field("watermark_path", &self.watermark_path)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteDirectory> Syncer<R> {
    /// Creates a syncer. The watermark lives next to the store file; an
    /// in-memory store has none.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid settings.
    pub fn new(directory: Arc<Directory>, remote: R, config: SyncConfig) -> Result<Self> {
        config.validate().context(ConfigSnafu)?;
        let watermark_path = directory.store().path().map(watermark::path_for);
        Ok(Self { directory, remote, config, watermark_path })
    }

    /// Overrides the watermark file location.
    #[must_use]
    pub fn with_watermark_path(mut self, path: Option<PathBuf>) -> Self {
        self.watermark_path = path;
        self
    }

    pub fn watermark_path(&self) -> Option<&std::path::Path> {
        self.watermark_path.as_deref()
    }

    /// Runs one sync.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error: remote stream failures,
    /// store failures, `Cancelled`, or a rejected manifest. Nothing from the
    /// data stream is committed and the watermark is untouched on error.
    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn run(&self, mode: Mode, cancel: &CancellationToken) -> Result<SyncReport> {
        let started = Instant::now();
        let result = self.run_stages(mode, cancel).await;
        metrics::record_run(result.is_ok(), started.elapsed().as_secs_f64());
        match &result {
            Ok(report) => {
                metrics::record_entries("object", &report.objects);
                metrics::record_entries("relation", &report.relations);
                info!(
                    objects = report.objects.received,
                    relations = report.relations.received,
                    written = report.objects.written + report.relations.written,
                    deleted = report.objects.deleted + report.relations.deleted,
                    errors = report.failures.len(),
                    manifest_changed = report.manifest_changed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sync complete"
                );
            },
            Err(e) => warn!(error = %e, code = %e.code(), "Sync failed"),
        }
        result
    }

    async fn run_stages(&self, mode: Mode, cancel: &CancellationToken) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if mode.contains(Mode::MANIFEST) {
            report.manifest_changed = manifest::sync_manifest(&self.directory, &self.remote).await?;
        }
        if !mode.streams_data() {
            return Ok(report);
        }
        if mode.conflicting() {
            warn!("Diff and watermark both requested; streaming everything for diff");
        }

        let previous = match &self.watermark_path {
            Some(path) => Watermark::load(path)?,
            None => None,
        };
        let start_from = if mode.from_watermark() {
            previous.as_ref().map(Watermark::timestamp)
        } else {
            None
        };
        let filter = mode.diff().then(|| {
            let expected = expected_entries(previous.as_ref().map(|w| w.count), self.config.filter_floor);
            KeyFilter::new(expected, self.config.filter_fp_rate)
        });
        debug!(?start_from, filter = ?filter, "Starting data sync");

        let stream = self.remote.export(ExportOption::Data as u32, start_from).await?;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (verdict_tx, verdict_rx) = oneshot::channel();

        let producer = tokio::spawn(produce(stream, tx, filter, cancel.clone()));
        let subscriber = {
            let directory = Arc::clone(&self.directory);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                subscribe(&directory, rx, verdict_rx, &errors_tx, &cancel)
            })
        };
        let failures = tokio::spawn(collect_failures(errors_rx));

        let produced = producer.await.unwrap_or_else(|e| Err(join_error("producer", &e)));
        let producer_error = match produced {
            Ok(filter) => {
                let _ = verdict_tx.send(Verdict::Commit { filter });
                None
            },
            Err(e) => {
                let _ = verdict_tx.send(Verdict::Abort);
                Some(e)
            },
        };
        let applied = subscriber.await.unwrap_or_else(|e| Err(join_error("subscriber", &e)));
        report.failures = failures.await.unwrap_or_default();
        if let Some(e) = producer_error {
            return Err(e);
        }
        let applied = applied?;
        report.objects = applied.objects;
        report.relations = applied.relations;

        if let Some(path) = &self.watermark_path {
            let stats = self.directory.stats()?;
            let ts = applied
                .max_updated
                .or_else(|| previous.as_ref().map(Watermark::timestamp))
                .unwrap_or_default();
            let mark = Watermark::new(ts, stats.total_objects(), stats.total_relations());
            mark.save(path)?;
            report.watermark = Some(mark);
        }
        Ok(report)
    }
}

enum Verdict {
    Commit { filter: Option<KeyFilter> },
    Abort,
}

#[derive(Debug, Default)]
struct Applied {
    objects: EntryCounters,
    relations: EntryCounters,
    max_updated: Option<Timestamp>,
}

fn join_error(stage: &'static str, e: &tokio::task::JoinError) -> SyncError {
    SyncError::Worker { stage, message: e.to_string() }
}

async fn produce(
    mut stream: ExportStream,
    tx: mpsc::Sender<ExportResponse>,
    mut filter: Option<KeyFilter>,
    cancel: CancellationToken,
) -> Result<Option<KeyFilter>> {
    let mut forwarded = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(stage = "producer", forwarded, "Cancelled");
                return Err(SyncError::Cancelled);
            },
            next = stream.next() => next,
        };
        let Some(item) = next else {
            break;
        };
        let msg = item.inspect_err(|e| warn!(stage = "producer", error = %e, "Export stream failed"))?;
        if let Some(filter) = filter.as_mut() {
            match &msg.msg {
                Some(Msg::Object(obj)) => filter.insert(&keys::object_key(&obj.r#type, &obj.id)),
                Some(Msg::Relation(rel)) => {
                    filter.insert(&keys::relation_key(Direction::ObjectToSubject, rel));
                },
                Some(Msg::Stats(_)) | None => {},
            }
        }
        if tx.send(msg).await.is_err() {
            debug!(stage = "producer", forwarded, "Subscriber stopped");
            break;
        }
        forwarded += 1;
    }
    debug!(stage = "producer", forwarded, "Export stream drained");
    Ok(filter)
}

fn subscribe(
    directory: &Directory,
    mut rx: mpsc::Receiver<ExportResponse>,
    verdict: oneshot::Receiver<Verdict>,
    errors: &mpsc::UnboundedSender<EntryError>,
    cancel: &CancellationToken,
) -> Result<Applied> {
    let txn = directory.store().write()?;
    let mut applied = Applied::default();

    while let Some(msg) = rx.blocking_recv() {
        if cancel.is_cancelled() {
            debug!(stage = "subscriber", "Cancelled, rolling back");
            txn.abort()?;
            return Err(SyncError::Cancelled);
        }
        match msg.msg {
            Some(Msg::Object(mut obj)) => {
                applied.objects.received += 1;
                applied.max_updated =
                    convert::max_timestamp(applied.max_updated, obj.updated_at.as_ref());
                let key = format!("{}:{}", obj.r#type, obj.id);
                obj.etag.clear();
                let result = directory.set_object_in(&txn, obj).map(|o| o.written);
                record_set(&mut applied.objects, "object", key, result, errors)?;
            },
            Some(Msg::Relation(mut rel)) => {
                applied.relations.received += 1;
                applied.max_updated =
                    convert::max_timestamp(applied.max_updated, rel.updated_at.as_ref());
                let key = relation_display(&rel);
                rel.etag.clear();
                let result = directory.set_relation_in(&txn, rel).map(|o| o.written);
                record_set(&mut applied.relations, "relation", key, result, errors)?;
            },
            Some(Msg::Stats(_)) | None => debug!(stage = "subscriber", "Skipped non-data message"),
        }
    }

    let filter = match verdict.blocking_recv() {
        Ok(Verdict::Commit { filter }) => filter,
        Ok(Verdict::Abort) | Err(_) => {
            debug!(stage = "subscriber", "Producer failed, rolling back");
            txn.abort()?;
            return Err(SyncError::Worker { stage: "subscriber", message: "producer failed".into() });
        },
    };
    if let Some(filter) = &filter {
        difference(directory, &txn, filter, &mut applied, errors)?;
    }
    txn.commit()?;
    debug!(
        stage = "subscriber",
        objects = applied.objects.received,
        relations = applied.relations.received,
        "Committed"
    );
    Ok(applied)
}

/// Deletes local entries whose keys the producer never saw.
fn difference(
    directory: &Directory,
    txn: &WriteTransaction,
    filter: &KeyFilter,
    applied: &mut Applied,
    errors: &mpsc::UnboundedSender<EntryError>,
) -> Result<()> {
    for key in stale_keys(txn, &buckets::objects(), filter)? {
        let id = keys::parse_object_key(&key)?;
        let display = format!("{}:{}", id.object_type, id.object_id);
        let result = directory.delete_object_in(txn, &id, "", false).map(|o| o.existed);
        record_delete(&mut applied.objects, "object", display, result, errors)?;
    }

    let direction = Direction::ObjectToSubject;
    for key in stale_keys(txn, &direction.bucket(), filter)? {
        let id = keys::parse_relation_key(direction, &key)?;
        let display = relation_display(&id);
        let result = directory.delete_relation_in(txn, &id, "");
        record_delete(&mut applied.relations, "relation", display, result, errors)?;
    }

    info!(
        stage = "difference",
        objects = applied.objects.deleted,
        relations = applied.relations.deleted,
        filter_keys = filter.inserted(),
        "Removed entries missing remotely"
    );
    Ok(())
}

fn stale_keys<T: ReadTxn + ?Sized>(txn: &T, path: &Path, filter: &KeyFilter) -> Result<Vec<Vec<u8>>> {
    let mut stale = Vec::new();
    if !txn.bucket_exists(path)? {
        return Ok(stale);
    }
    let mut cursor = Cursor::new(txn, path, &[])?;
    while cursor.advance()? {
        if let Some(key) = cursor.key() {
            if !filter.may_contain(key) {
                stale.push(key.to_vec());
            }
        }
    }
    Ok(stale)
}

fn relation_display<R: RelationTuple + ?Sized>(rel: &R) -> String {
    let t = rel.tuple();
    let mut key = format!(
        "{}:{}#{}@{}:{}",
        t.object_type, t.object_id, t.relation, t.subject_type, t.subject_id
    );
    if !t.subject_relation.is_empty() {
        key.push('#');
        key.push_str(t.subject_relation);
    }
    key
}

fn record_set(
    counters: &mut EntryCounters,
    kind: &'static str,
    key: String,
    result: Result<bool, DirectoryError>,
    errors: &mpsc::UnboundedSender<EntryError>,
) -> Result<()> {
    match result {
        Ok(true) => counters.written += 1,
        Ok(false) => counters.unchanged += 1,
        Err(e) => entry_error(counters, "subscriber", kind, key, e, errors)?,
    }
    Ok(())
}

fn record_delete(
    counters: &mut EntryCounters,
    kind: &'static str,
    key: String,
    result: Result<bool, DirectoryError>,
    errors: &mpsc::UnboundedSender<EntryError>,
) -> Result<()> {
    match result {
        Ok(true) => counters.deleted += 1,
        Ok(false) => {},
        Err(e) => entry_error(counters, "difference", kind, key, e, errors)?,
    }
    Ok(())
}

fn entry_error(
    counters: &mut EntryCounters,
    stage: &'static str,
    kind: &'static str,
    key: String,
    error: DirectoryError,
    errors: &mpsc::UnboundedSender<EntryError>,
) -> Result<()> {
    if error.is_fatal() {
        return Err(error.into());
    }
    counters.errors += 1;
    let _ = errors.send(EntryError { stage, kind, key, code: error.code(), message: error.to_string() });
    Ok(())
}

async fn collect_failures(mut rx: mpsc::UnboundedReceiver<EntryError>) -> Vec<EntryError> {
    let mut failures = Vec::new();
    while let Some(failure) = rx.recv().await {
        warn!(
            stage = failure.stage,
            kind = failure.kind,
            key = %failure.key,
            code = %failure.code,
            error = %failure.message,
            "Entry rejected"
        );
        failures.push(failure);
    }
    failures
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use reldir_directory::ManifestCompiler;
    use reldir_store::PageOptions;
    use reldir_test_utils::fixtures;

    use super::*;
    use crate::remote::LocalRemote;

    fn directory() -> Arc<Directory> {
        Arc::new(Directory::in_memory(Arc::new(ManifestCompiler)).expect("directory"))
    }

    fn syncer(source: &Arc<Directory>, target: &Arc<Directory>) -> Syncer<LocalRemote> {
        let config = SyncConfig { channel_capacity: 2, filter_floor: 64, ..SyncConfig::default() };
        Syncer::new(Arc::clone(target), LocalRemote::new(Arc::clone(source)), config).expect("syncer")
    }

    fn ids(dir: &Directory, object_type: &str) -> Vec<String> {
        dir.get_objects(object_type, &PageOptions::new(100))
            .expect("list")
            .results
            .into_iter()
            .map(|o| o.id)
            .collect()
    }

    #[tokio::test]
    async fn test_full_sync_copies_everything() {
        let source = directory();
        for id in ["a", "b", "c"] {
            source.set_object(fixtures::object("user", id)).expect("object");
        }
        source
            .set_relation(fixtures::relation(("group", "eng"), "member", ("user", "a")))
            .expect("relation");
        let target = directory();

        let report = syncer(&source, &target).run(Mode::FULL, &CancellationToken::new()).await.expect("sync");
        assert_eq!(report.objects.received, 3);
        assert_eq!(report.objects.written, 3);
        assert_eq!(report.relations.written, 1);
        assert_eq!(ids(&target, "user"), ["a", "b", "c"]);
        assert!(report.watermark.is_none());

        let again = syncer(&source, &target).run(Mode::FULL, &CancellationToken::new()).await.expect("sync");
        assert_eq!(again.objects.unchanged, 3);
        assert_eq!(again.objects.written, 0);
    }

    #[tokio::test]
    async fn test_diff_removes_entries_missing_remotely() {
        let source = directory();
        let target = directory();
        for id in ["a", "b"] {
            source.set_object(fixtures::object("user", id)).expect("source");
        }
        for id in ["a", "b", "c"] {
            target.set_object(fixtures::object("user", id)).expect("target");
        }
        target
            .set_relation(fixtures::relation(("group", "eng"), "member", ("user", "c")))
            .expect("stale relation");

        let report = syncer(&source, &target).run(Mode::DIFF, &CancellationToken::new()).await.expect("sync");
        assert_eq!(ids(&target, "user"), ["a", "b"]);
        assert_eq!(report.objects.deleted, 1);
        assert_eq!(report.relations.deleted, 1);
        assert_eq!(target.stats().expect("stats").total_relations(), 0);
    }

    #[tokio::test]
    async fn test_entry_errors_do_not_abort() {
        let source = directory();
        source.set_object(fixtures::object("user", "a")).expect("user");
        source.set_object(fixtures::object("device", "d")).expect("device");
        let target = directory();
        target.set_manifest(fixtures::SAMPLE_MANIFEST.as_bytes()).expect("manifest");

        let report = syncer(&source, &target).run(Mode::FULL, &CancellationToken::new()).await.expect("sync");
        assert_eq!(report.objects.written, 1);
        assert_eq!(report.objects.errors, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "device:d");
        assert_eq!(report.failures[0].code, ErrorCode::ModelRejected);
    }

    #[tokio::test]
    async fn test_cancelled_sync_commits_nothing() {
        let source = directory();
        source.set_object(fixtures::object("user", "a")).expect("user");
        let target = directory();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = syncer(&source, &target).run(Mode::FULL, &cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert!(ids(&target, "user").is_empty());
    }

    #[test]
    fn test_relation_display_keeps_subject_relation() {
        let direct = fixtures::relation(("folder", "f1"), "viewer", ("group", "eng"));
        let nested = fixtures::subject_set(("folder", "f1"), "viewer", ("group", "eng"), "member");
        assert_eq!(relation_display(&direct), "folder:f1#viewer@group:eng");
        assert_eq!(relation_display(&nested), "folder:f1#viewer@group:eng#member");
    }

    #[tokio::test]
    async fn test_manifest_only_streams_nothing() {
        let source = directory();
        source.set_manifest(fixtures::SAMPLE_MANIFEST.as_bytes()).expect("manifest");
        source.set_object(fixtures::object("user", "a")).expect("user");
        let target = directory();

        let report =
            syncer(&source, &target).run(Mode::MANIFEST, &CancellationToken::new()).await.expect("sync");
        assert!(report.manifest_changed);
        assert_eq!(report.objects.received, 0);
        assert!(ids(&target, "user").is_empty());
    }
}
