use reldir_store::StoreError;
use reldir_types::{ErrorCode, ValidationError, config::ConfigError};
use snafu::Snafu;

/// Result type for directory operations.
pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;

/// Directory error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DirectoryError {
    /// Storage or encoding failure, passed through unchanged.
    #[snafu(context(false), display("{source}"))]
    Store { source: StoreError },

    #[snafu(display("Invalid {kind}: {source}"))]
    Validation { kind: &'static str, source: ValidationError },

    #[snafu(display("{kind} {key}: expected etag {expected:?}, current etag {current:?}"))]
    HashMismatch { kind: &'static str, key: String, expected: String, current: String },

    #[snafu(display("{count} relations match {key}"))]
    MultipleResults { key: String, count: usize },

    #[snafu(display("Rejected by model: {message}"))]
    ModelRejected { message: String },

    #[snafu(display("No model loaded"))]
    ModelNotLoaded,

    #[snafu(display("Failed to compile manifest: {message}"))]
    ModelCompile { message: String },

    #[snafu(display("Model update would orphan existing data: {}", problems.join("; ")))]
    ModelIncompatible { problems: Vec<String> },

    #[snafu(display("Invalid configuration: {source}"))]
    Config { source: ConfigError },

    #[snafu(display("Check worker failed: {message}"))]
    Worker { message: String },

    #[snafu(display("Cancelled after {applied} operations"))]
    Cancelled { applied: u64 },
}

impl DirectoryError {
    /// Returns the machine-readable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store { source } => source.code(),
            Self::Validation { .. } => ErrorCode::InvalidArgument,
            Self::HashMismatch { .. } => ErrorCode::HashMismatch,
            Self::MultipleResults { .. } => ErrorCode::MultipleResults,
            Self::ModelRejected { .. } | Self::ModelCompile { .. } | Self::ModelIncompatible { .. } => {
                ErrorCode::ModelRejected
            },
            Self::ModelNotLoaded => ErrorCode::ModelNotLoaded,
            Self::Config { .. } => ErrorCode::Config,
            Self::Worker { .. } => ErrorCode::Internal,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    /// Whether the addressed entry or bucket does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store { source } if source.is_not_found())
    }

    /// Whether the error concerns the store itself rather than one entry.
    ///
    /// Batch writers (import, sync) record entry errors and continue; a
    /// fatal error aborts the whole transaction.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store { source } => matches!(
                source.code(),
                ErrorCode::StoreOpen
                    | ErrorCode::StoreTransaction
                    | ErrorCode::StoreTable
                    | ErrorCode::StoreTimeout
                    | ErrorCode::Io
            ),
            Self::Worker { .. } | Self::Cancelled { .. } => true,
            _ => false,
        }
    }

    /// Whether the error is an optimistic-concurrency conflict.
    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }
}
