use std::path::PathBuf;

use reldir_directory::DirectoryError;
use reldir_store::StoreError;
use reldir_types::{ErrorCode, config::ConfigError};
use snafu::Snafu;

/// Result type for sync operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Sync error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SyncError {
    /// Local directory failure, passed through unchanged.
    #[snafu(context(false), display("{source}"))]
    Directory { source: DirectoryError },

    #[snafu(context(false), display("{source}"))]
    Store { source: StoreError },

    #[snafu(display("Remote call failed: {source}"))]
    Remote { source: tonic::Status },

    #[snafu(display("Failed to connect to {address}: {source}"))]
    Connect { address: String, source: tonic::transport::Error },

    #[snafu(display("Invalid remote address {address:?}"))]
    InvalidAddress { address: String },

    #[snafu(display("Invalid request metadata {name}"))]
    InvalidMetadata { name: &'static str },

    #[snafu(display("Unknown sync mode {mode:?}"))]
    InvalidMode { mode: String },

    #[snafu(display("Watermark file {}: {source}", path.display()))]
    WatermarkIo { path: PathBuf, source: std::io::Error },

    #[snafu(display("Watermark file {} is not valid: {source}", path.display()))]
    WatermarkFormat { path: PathBuf, source: serde_json::Error },

    #[snafu(display("Invalid configuration: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("Sync cancelled"))]
    Cancelled,

    #[snafu(display("Sync {stage} task failed: {message}"))]
    Worker { stage: &'static str, message: String },
}

impl SyncError {
    /// Returns the machine-readable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Directory { source } => source.code(),
            Self::Store { source } => source.code(),
            Self::Remote { .. } | Self::Connect { .. } => ErrorCode::SyncRemote,
            Self::InvalidAddress { .. }
            | Self::InvalidMetadata { .. }
            | Self::InvalidMode { .. }
            | Self::Config { .. } => ErrorCode::Config,
            Self::WatermarkIo { .. } | Self::WatermarkFormat { .. } => ErrorCode::SyncWatermark,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Worker { .. } => ErrorCode::Internal,
        }
    }
}
