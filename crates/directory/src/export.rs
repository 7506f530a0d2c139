//! Streaming export of objects, relations and stats.

use prost_types::Timestamp;
use reldir_store::{Cursor, ReadTransaction, ReadTxn, Store, buckets, keys::Direction};
use reldir_types::{
    ExportOption, ExportResponse, Object, Relation, convert::ordering_key, export_response::Msg,
    properties,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{
    directory::Directory,
    error::{DirectoryError, Result},
    stats,
};

const OBJECTS: u32 = ExportOption::Objects as u32;
const RELATIONS: u32 = ExportOption::Relations as u32;
const STATS: u32 = ExportOption::Stats as u32;

/// Normalizes an option bit set; an empty set exports all data.
pub fn export_options(options: u32) -> u32 {
    if options == ExportOption::Unspecified as u32 { ExportOption::Data as u32 } else { options }
}

impl Directory {
    /// Streams the directory from one read snapshot.
    ///
    /// Objects come first, then relations, each filtered to entries updated
    /// at or after `start_from`, then optionally a stats document. The
    /// stream ends after the first error.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn export(
        &self,
        options: u32,
        start_from: Option<Timestamp>,
    ) -> ReceiverStream<Result<ExportResponse>> {
        let options = export_options(options);
        let (tx, rx) = mpsc::channel(self.config().export_channel_capacity);
        let store = self.store().clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = produce(&store, options, start_from.as_ref(), &tx) {
                warn!(error = %e, "Export failed");
                let _ = tx.blocking_send(Err(e));
            }
        });
        ReceiverStream::new(rx)
    }
}

fn produce(
    store: &Store,
    options: u32,
    start_from: Option<&Timestamp>,
    tx: &mpsc::Sender<Result<ExportResponse>>,
) -> Result<()> {
    let txn = store.read()?;
    let since = start_from.map(|ts| ordering_key(Some(ts)));
    let fresh = |updated_at: Option<&Timestamp>| since.is_none_or(|s| ordering_key(updated_at) >= s);
    let mut sent = 0u64;

    if options & OBJECTS != 0 {
        sent += send_bucket::<Object>(&txn, &buckets::objects(), tx, |o| {
            fresh(o.updated_at.as_ref()).then(|| Msg::Object(o))
        })?;
    }
    if options & RELATIONS != 0 {
        sent += send_bucket::<Relation>(&txn, &Direction::ObjectToSubject.bucket(), tx, |r| {
            fresh(r.updated_at.as_ref()).then(|| Msg::Relation(r))
        })?;
    }
    if options & STATS != 0 {
        let stats = stats::collect(&txn)?;
        let value = serde_json::to_value(&stats)
            .map_err(|e| DirectoryError::Worker { message: e.to_string() })?;
        send(tx, Msg::Stats(properties::from_json(value)))?;
        sent += 1;
    }
    debug!(options, sent, "Export complete");
    Ok(())
}

fn send_bucket<M: reldir_types::Codec>(
    txn: &ReadTransaction,
    path: &reldir_store::Path,
    tx: &mpsc::Sender<Result<ExportResponse>>,
    mut select: impl FnMut(M) -> Option<Msg>,
) -> Result<u64> {
    if !txn.bucket_exists(path)? {
        return Ok(0);
    }
    let mut sent = 0;
    let mut cursor = Cursor::new(txn, path, &[])?;
    while cursor.advance()? {
        if let Some(msg) = cursor.decode::<M>()?.and_then(&mut select) {
            send(tx, msg)?;
            sent += 1;
        }
    }
    Ok(sent)
}

fn send(tx: &mpsc::Sender<Result<ExportResponse>>, msg: Msg) -> Result<()> {
    tx.blocking_send(Ok(ExportResponse { msg: Some(msg) }))
        .map_err(|_| DirectoryError::Cancelled { applied: 0 })
}
