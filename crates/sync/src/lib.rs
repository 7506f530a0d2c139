//! Remote-to-local synchronization for reldir.
//!
//! A [`Syncer`] pulls from a [`RemoteDirectory`] into a local
//! [`Directory`](reldir_directory::Directory) in the requested [`Mode`]:
//!
//! - `manifest`: copy the remote manifest when its etag differs
//! - `full`: stream every object and relation and upsert it locally
//! - `diff`: full, then delete local entries the remote did not send
//! - `watermark`: full, starting at the timestamp saved by the last run
//!
//! Data is applied in one write transaction, so a failed or cancelled run
//! leaves the store as it was.

#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Remote errors carry tonic::Status (176 bytes).
#![allow(clippy::result_large_err)]

mod engine;
mod error;
pub mod filter;
mod grpc;
mod manifest;
pub mod metrics;
mod mode;
mod remote;
pub mod watermark;

pub use engine::{EntryCounters, EntryError, SyncReport, Syncer};
pub use error::{Result, SyncError};
pub use grpc::GrpcRemote;
pub use manifest::sync_manifest;
pub use mode::Mode;
pub use remote::{
    ExportStream, LocalRemote, MANIFEST_CHUNK_SIZE, ManifestStream, RemoteDirectory, RemoteManifest,
    read_manifest,
};
pub use watermark::Watermark;
