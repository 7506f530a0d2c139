//! Error code catalog.
//!
//! Every error enum in the workspace (`StoreError`, `DirectoryError`,
//! `SyncError`, ...) maps each variant to an [`ErrorCode`] with a unique
//! numeric identifier, a retryability classification and a suggested
//! recovery action.

use core::fmt;

/// Machine-readable error codes for programmatic error handling.
///
/// | Range       | Domain     | Examples                                  |
/// |-------------|------------|-------------------------------------------|
/// | 1000–1099   | Store      | Open, transaction, table ops, lock wait   |
/// | 1100–1199   | Store I/O  | Backup, key encoding                      |
/// | 2000–2099   | Schema     | Version checks, migration steps           |
/// | 3000–3099   | Directory  | Not found, uniqueness violations          |
/// | 3100–3199   | Directory  | Etag mismatch, invalid arguments, model   |
/// | 3200–3299   | Common     | Serialization, config, I/O, internal      |
/// | 4000–4099   | Sync       | Remote stream, cancellation, watermark    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Store errors (1000–1199) ---
    /// Database file could not be opened.
    StoreOpen = 1000,
    /// Transaction begin or commit failed.
    StoreTransaction = 1001,
    /// Table (bucket) operation failed.
    StoreTable = 1002,
    /// Lock acquisition did not complete within the configured timeout.
    StoreTimeout = 1003,
    /// Backup file could not be written.
    StoreBackup = 1100,
    /// A stored key does not follow the key encoding.
    StoreKeyEncoding = 1101,

    // --- Schema errors (2000–2099) ---
    /// The store predates the running binary and must be migrated.
    SchemaUpdateRequired = 2000,
    /// The store was written by a newer binary.
    SchemaVersionHigher = 2001,
    /// A migration step failed.
    SchemaMigrationFailed = 2002,

    // --- Directory errors (3000–3199) ---
    /// Bucket path does not exist.
    PathNotFound = 3000,
    /// Key does not exist.
    KeyNotFound = 3001,
    /// Key already exists where it must be unique.
    KeyExists = 3002,
    /// A lookup that must be unique matched several entries.
    MultipleResults = 3003,
    /// Expected etag does not match the stored etag.
    HashMismatch = 3100,
    /// Invalid request argument.
    InvalidArgument = 3101,
    /// Continuation token could not be decoded.
    InvalidPageToken = 3102,
    /// The authorization model rejected the request.
    ModelRejected = 3103,
    /// No authorization model is loaded.
    ModelNotLoaded = 3104,

    // --- Common errors (3200–3299) ---
    /// Serialization or deserialization error.
    Serialization = 3200,
    /// Configuration error.
    Config = 3201,
    /// Filesystem or network I/O error.
    Io = 3202,
    /// Internal error (unexpected state, invariant violation).
    Internal = 3203,

    // --- Sync errors (4000–4099) ---
    /// Remote directory call failed.
    SyncRemote = 4000,
    /// Import or sync run was cancelled.
    Cancelled = 4001,
    /// Watermark file could not be read or written.
    SyncWatermark = 4002,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::StoreOpen),
            1001 => Some(Self::StoreTransaction),
            1002 => Some(Self::StoreTable),
            1003 => Some(Self::StoreTimeout),
            1100 => Some(Self::StoreBackup),
            1101 => Some(Self::StoreKeyEncoding),
            2000 => Some(Self::SchemaUpdateRequired),
            2001 => Some(Self::SchemaVersionHigher),
            2002 => Some(Self::SchemaMigrationFailed),
            3000 => Some(Self::PathNotFound),
            3001 => Some(Self::KeyNotFound),
            3002 => Some(Self::KeyExists),
            3003 => Some(Self::MultipleResults),
            3100 => Some(Self::HashMismatch),
            3101 => Some(Self::InvalidArgument),
            3102 => Some(Self::InvalidPageToken),
            3103 => Some(Self::ModelRejected),
            3104 => Some(Self::ModelNotLoaded),
            3200 => Some(Self::Serialization),
            3201 => Some(Self::Config),
            3202 => Some(Self::Io),
            3203 => Some(Self::Internal),
            4000 => Some(Self::SyncRemote),
            4001 => Some(Self::Cancelled),
            4002 => Some(Self::SyncWatermark),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    ///
    /// Retryable errors may succeed on a subsequent attempt. An etag mismatch
    /// is only retryable after the caller re-reads the entity, so it is not
    /// listed here.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StoreTransaction | Self::StoreTimeout | Self::Io | Self::SyncRemote)
    }

    /// Suggested recovery action for this error code.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::StoreOpen => {
                "Verify the database path exists with correct permissions. Restore from a backup if the file is corrupted."
            },
            Self::StoreTransaction => {
                "Retry the transaction. Only one write transaction can be active at a time."
            },
            Self::StoreTable => "Check that the bucket exists and the store file is not damaged.",
            Self::StoreTimeout => {
                "Another process holds the database lock. Stop it or raise request_timeout."
            },
            Self::StoreBackup => "Check free disk space next to the store file.",
            Self::StoreKeyEncoding => {
                "A stored key is malformed. Restore from the most recent migration backup."
            },
            Self::SchemaUpdateRequired => "Run `reldir migrate` or enable auto_migrate.",
            Self::SchemaVersionHigher => {
                "Upgrade the binary; the store was written by a newer version."
            },
            Self::SchemaMigrationFailed => {
                "Inspect the logs. The store stays at the last completed version and its backup remains on disk."
            },
            Self::PathNotFound => "The bucket does not exist yet. Write to it first or check the path.",
            Self::KeyNotFound => "Verify the identifier. The entity does not exist.",
            Self::KeyExists => "The entity already exists. Read it and update instead.",
            Self::MultipleResults => {
                "The lookup is ambiguous. Specify every identifier field, including subject_relation."
            },
            Self::HashMismatch => "Re-read the entity to obtain its current etag, then retry.",
            Self::InvalidArgument => "Fix the request fields and retry.",
            Self::InvalidPageToken => "Restart pagination without a token.",
            Self::ModelRejected => {
                "Check the object type, relation and subject type against the manifest."
            },
            Self::ModelNotLoaded => "Load a manifest with `set_manifest` or a manifest sync.",
            Self::Serialization => "The stored value is corrupt or from an incompatible version.",
            Self::Config => "Fix the configuration value named in the message.",
            Self::Io => "Check filesystem permissions, disk space or network connectivity.",
            Self::Internal => "Report this error with the logs attached.",
            Self::SyncRemote => "Check the remote address, credentials and connectivity, then retry.",
            Self::Cancelled => "The run was cancelled; start it again to resume.",
            Self::SyncWatermark => {
                "Check permissions on the `.sync` file next to the store, or delete it to force a full sync."
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
