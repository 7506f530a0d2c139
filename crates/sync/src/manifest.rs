//! Manifest synchronization.

use std::sync::Arc;

use reldir_directory::Directory;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Result, SyncError},
    remote::{RemoteDirectory, read_manifest},
};

/// Pulls the remote manifest and stores it when its etag differs from the
/// local one. Returns whether the local manifest changed.
///
/// The store keeps the current manifest when the new model would orphan
/// existing data.
///
/// # Errors
///
/// Returns remote errors, `ModelCompile` or `ModelIncompatible` from the
/// directory, or store errors.
#[instrument(skip_all, fields(stage = "manifest"))]
pub async fn sync_manifest<R: RemoteDirectory>(directory: &Arc<Directory>, remote: &R) -> Result<bool> {
    let Some(incoming) = read_manifest(remote.get_manifest().await?).await? else {
        warn!(stage = "manifest", "Remote has no manifest");
        return Ok(false);
    };

    let local = directory.get_manifest()?.and_then(|m| m.metadata).map(|m| m.etag);
    if local.as_deref() == Some(incoming.metadata.etag.as_str()) {
        debug!(stage = "manifest", etag = %incoming.metadata.etag, "Manifest unchanged");
        return Ok(false);
    }

    let dir = Arc::clone(directory);
    let stored = tokio::task::spawn_blocking(move || dir.set_manifest(&incoming.body))
        .await
        .map_err(|e| SyncError::Worker { stage: "manifest", message: e.to_string() })?
        .inspect_err(|e| warn!(stage = "manifest", error = %e, "Manifest rejected"))?;

    let changed = local.as_deref() != Some(stored.etag.as_str());
    if changed {
        info!(stage = "manifest", etag = %stored.etag, "Manifest updated");
    }
    Ok(changed)
}
