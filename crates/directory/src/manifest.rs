//! Manifest persistence under `_manifest/<name>`.
//!
//! The bucket holds three keys: `metadata` (etag and update time), `body`
//! (the authoring document) and `model` (the compiled model as JSON).

use prost_types::Timestamp;
use reldir_store::{ReadTxn, WriteTxn, buckets, typed};
use reldir_types::{Body, DEFAULT_MANIFEST, Manifest, ManifestMetadata, Model, body_etag};

use crate::error::Result;

/// Manifest storage operations.
pub(crate) struct ManifestStore;

impl ManifestStore {
    /// Reads metadata and body; `None` when no manifest was stored.
    pub fn get<T: ReadTxn + ?Sized>(txn: &T) -> Result<Option<Manifest>> {
        let path = buckets::manifest(DEFAULT_MANIFEST)?;
        if !txn.bucket_exists(&path)? {
            return Ok(None);
        }
        let metadata: Option<ManifestMetadata> =
            typed::try_get(txn, &path, buckets::MANIFEST_METADATA_KEY)?;
        let body: Option<Body> = typed::try_get(txn, &path, buckets::MANIFEST_BODY_KEY)?;
        Ok(metadata.map(|metadata| Manifest { metadata: Some(metadata), body }))
    }

    /// Stored metadata only.
    pub fn metadata<T: ReadTxn + ?Sized>(txn: &T) -> Result<Option<ManifestMetadata>> {
        let path = buckets::manifest(DEFAULT_MANIFEST)?;
        if !txn.bucket_exists(&path)? {
            return Ok(None);
        }
        Ok(typed::try_get(txn, &path, buckets::MANIFEST_METADATA_KEY)?)
    }

    /// Compiled model stored next to the body.
    pub fn model<T: ReadTxn + ?Sized>(txn: &T) -> Result<Option<Model>> {
        let path = buckets::manifest(DEFAULT_MANIFEST)?;
        if !typed::key_exists(txn, &path, buckets::MANIFEST_MODEL_KEY)? {
            return Ok(None);
        }
        Ok(Some(typed::get_any(txn, &path, buckets::MANIFEST_MODEL_KEY)?))
    }

    /// Replaces body, model and metadata. Returns the new metadata.
    pub fn put<T: WriteTxn + ?Sized>(
        txn: &T,
        body: &[u8],
        model: &Model,
        now: Timestamp,
    ) -> Result<ManifestMetadata> {
        let path = buckets::manifest(DEFAULT_MANIFEST)?;
        txn.create_bucket(&path)?;
        let metadata = ManifestMetadata { updated_at: Some(now), etag: body_etag(body) };
        typed::set(txn, &path, buckets::MANIFEST_BODY_KEY, Body { data: body.to_vec() })?;
        typed::set_any(txn, &path, buckets::MANIFEST_MODEL_KEY, model)?;
        Ok(typed::set(txn, &path, buckets::MANIFEST_METADATA_KEY, metadata)?)
    }

    /// Drops the manifest bucket. Returns whether it existed.
    pub fn delete<T: WriteTxn + ?Sized>(txn: &T) -> Result<bool> {
        let path = buckets::manifest(DEFAULT_MANIFEST)?;
        Ok(typed::delete_bucket(txn, &path)?)
    }
}
