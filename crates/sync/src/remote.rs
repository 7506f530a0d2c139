//! The remote side of a sync.

use std::{future::Future, sync::Arc};

use futures::{StreamExt, stream::BoxStream};
use prost_types::Timestamp;
use reldir_directory::Directory;
use reldir_types::{
    Body, ExportResponse, GetManifestResponse, ManifestMetadata, get_manifest_response,
};
use snafu::ensure;
use tracing::warn;

use crate::error::{Result, SyncError, WorkerSnafu};

/// Stream of exported objects, relations and stats.
pub type ExportStream = BoxStream<'static, Result<ExportResponse>>;

/// Manifest metadata followed by body chunks.
pub type ManifestStream = BoxStream<'static, Result<GetManifestResponse>>;

/// Body chunk size used when serving a manifest.
pub const MANIFEST_CHUNK_SIZE: usize = 64 * 1024;

/// A directory that can be read as a sync source.
pub trait RemoteDirectory: Send + Sync {
    /// Opens an export stream of the given option bits, limited to entries
    /// updated at or after `start_from`.
    fn export(
        &self,
        options: u32,
        start_from: Option<Timestamp>,
    ) -> impl Future<Output = Result<ExportStream>> + Send;

    /// Opens a manifest stream. An empty stream means no manifest.
    fn get_manifest(&self) -> impl Future<Output = Result<ManifestStream>> + Send;
}

/// Manifest reassembled from a [`ManifestStream`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteManifest {
    pub metadata: ManifestMetadata,
    pub body: Vec<u8>,
}

/// Collects a manifest stream. Returns `None` when the stream is empty.
///
/// # Errors
///
/// Returns stream errors, or `Worker` when body chunks arrive before the
/// metadata.
pub async fn read_manifest(mut stream: ManifestStream) -> Result<Option<RemoteManifest>> {
    let mut metadata = None;
    let mut body = Vec::new();
    while let Some(msg) = stream.next().await {
        match msg?.msg {
            Some(get_manifest_response::Msg::Metadata(m)) => metadata = Some(m),
            Some(get_manifest_response::Msg::Body(chunk)) => {
                ensure!(
                    metadata.is_some(),
                    WorkerSnafu { stage: "manifest", message: "body before metadata" }
                );
                body.extend_from_slice(&chunk.data);
            },
            None => warn!(stage = "manifest", "Empty manifest message"),
        }
    }
    Ok(metadata.map(|metadata| RemoteManifest { metadata, body }))
}

/// Another opened directory used as the sync source.
#[derive(Debug, Clone)]
pub struct LocalRemote {
    directory: Arc<Directory>,
}

impl LocalRemote {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

impl RemoteDirectory for LocalRemote {
    async fn export(&self, options: u32, start_from: Option<Timestamp>) -> Result<ExportStream> {
        Ok(self.directory.export(options, start_from).map(|r| r.map_err(SyncError::from)).boxed())
    }

    async fn get_manifest(&self) -> Result<ManifestStream> {
        let Some(manifest) = self.directory.get_manifest()? else {
            return Ok(futures::stream::empty().boxed());
        };
        let metadata = manifest.metadata.unwrap_or_default();
        let body = manifest.body.map(|b| b.data).unwrap_or_default();
        let mut messages = vec![Ok(GetManifestResponse {
            msg: Some(get_manifest_response::Msg::Metadata(metadata)),
        })];
        messages.extend(body.chunks(MANIFEST_CHUNK_SIZE).map(|chunk| {
            Ok(GetManifestResponse {
                msg: Some(get_manifest_response::Msg::Body(Body { data: chunk.to_vec() })),
            })
        }));
        Ok(futures::stream::iter(messages).boxed())
    }
}
