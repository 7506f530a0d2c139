use std::time::Duration;

use reldir_types::{CodecError, ErrorCode};
use snafu::Snafu;

/// Result type for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Store error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("Failed to open database at {path}: {source}"))]
    Open { path: String, source: redb::DatabaseError },

    #[snafu(display("Timed out after {waited:?} waiting for the lock on {path}"))]
    Timeout { path: String, waited: Duration },

    #[snafu(display("Transaction error: {source}"))]
    Transaction { source: redb::TransactionError },

    #[snafu(display("Commit error: {source}"))]
    Commit { source: redb::CommitError },

    #[snafu(display("Table error: {source}"))]
    Table { source: redb::TableError },

    #[snafu(display("Storage error: {source}"))]
    Storage { source: redb::StorageError },

    #[snafu(display("Bucket {path} not found"))]
    PathNotFound { path: String },

    #[snafu(display("Key {key} not found in {path}"))]
    KeyNotFound { path: String, key: String },

    #[snafu(display("Invalid bucket path {path:?}: {message}"))]
    InvalidPath { path: String, message: String },

    #[snafu(display("Failed to decode value at {path}/{key}: {source}"))]
    Codec { path: String, key: String, source: CodecError },

    #[snafu(display("Failed to encode value for {path}: {source}"))]
    Encode { path: String, source: CodecError },

    #[snafu(display("Invalid key {key}: {message}"))]
    InvalidKey { key: String, message: String },

    #[snafu(display("Invalid page token: {message}"))]
    InvalidPageToken { message: String },

    #[snafu(display("I/O error on {path}: {source}"))]
    Io { path: String, source: std::io::Error },

    #[snafu(display("Invalid schema version {version:?}"))]
    InvalidVersion { version: String },

    #[snafu(display("Store schema {current} requires migration to {required}"))]
    SchemaUpdateRequired { current: String, required: String },

    #[snafu(display("Store schema {current} is newer than supported {required}"))]
    SchemaVersionHigher { current: String, required: String },

    #[snafu(display("Migration {from} -> {to} failed: {source}"))]
    Migration { from: String, to: String, source: Box<StoreError> },
}

impl StoreError {
    /// Returns the machine-readable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Open { .. } => ErrorCode::StoreOpen,
            Self::Timeout { .. } => ErrorCode::StoreTimeout,
            Self::Transaction { .. } | Self::Commit { .. } => ErrorCode::StoreTransaction,
            Self::Table { .. } | Self::Storage { .. } => ErrorCode::StoreTable,
            Self::PathNotFound { .. } => ErrorCode::PathNotFound,
            Self::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            Self::InvalidPath { .. } => ErrorCode::InvalidArgument,
            Self::Codec { .. } | Self::Encode { .. } => ErrorCode::Serialization,
            Self::InvalidKey { .. } => ErrorCode::StoreKeyEncoding,
            Self::InvalidPageToken { .. } => ErrorCode::InvalidPageToken,
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidVersion { .. } => ErrorCode::SchemaMigrationFailed,
            Self::SchemaUpdateRequired { .. } => ErrorCode::SchemaUpdateRequired,
            Self::SchemaVersionHigher { .. } => ErrorCode::SchemaVersionHigher,
            Self::Migration { .. } => ErrorCode::SchemaMigrationFailed,
        }
    }

    /// Whether the error means the addressed entry or bucket is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. } | Self::PathNotFound { .. })
    }
}

/// Renders a binary key for logs and error messages.
///
/// The type/id separator prints as `:` and the field separator as `|`.
pub fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key)
        .chars()
        .map(|c| match c {
            '\0' => ':',
            '\u{1f}' => '|',
            other => other,
        })
        .collect()
}
