//! Schema versioning and migration.
//!
//! The layout version lives under `_system/version`. A store without a
//! version is new and is initialized directly at [`REQUIRED_VERSION`].
//! Otherwise each step `from -> to` runs as:
//!
//! 1. back up the store to `<db-path>.<from>.bak` (an in-memory snapshot for in-memory stores)
//! 2. run the step's transform reading the backup and writing the live store
//! 3. write `to` as the version in the same transaction and commit
//!
//! A failed step leaves the store at `from` and keeps its backup.

mod steps;
mod version;

use std::path::{Path as FsPath, PathBuf};

use snafu::ResultExt;
use tracing::{info, warn};

pub use self::{
    steps::{V0_0_1, V0_0_2, V0_0_3},
    version::SchemaVersion,
};
use crate::{
    engine::Store,
    error::{MigrationSnafu, Result, StoreError},
    path::buckets,
    txn::{ReadTxn, WriteTransaction, WriteTxn},
};

/// Version of the layout this build reads and writes.
pub const REQUIRED_VERSION: SchemaVersion = V0_0_3;

/// What [`ensure`] or [`migrate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found at open; `None` for a new store.
    pub from: Option<SchemaVersion>,
    /// Version after the run.
    pub to: SchemaVersion,
    /// Versions reached by each applied step, in order.
    pub applied: Vec<SchemaVersion>,
    /// Backup files written, one per step on file-backed stores.
    pub backups: Vec<PathBuf>,
}

impl MigrationReport {
    fn unchanged(version: SchemaVersion) -> Self {
        Self { from: Some(version), to: version, applied: Vec::new(), backups: Vec::new() }
    }

    /// Whether the run changed anything.
    pub fn is_noop(&self) -> bool {
        self.from == Some(self.to) && self.applied.is_empty()
    }
}

/// Backup file for the step leaving `from`.
pub fn backup_path(db_path: &FsPath, from: SchemaVersion) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(format!(".{from}.bak"));
    PathBuf::from(name)
}

/// Reads the stored version; `None` when the store was never initialized.
///
/// # Errors
///
/// Returns `InvalidVersion` if the stored value does not parse.
pub fn current_version(store: &Store) -> Result<Option<SchemaVersion>> {
    let txn = store.read()?;
    read_version(&txn)
}

fn read_version<T: ReadTxn + ?Sized>(txn: &T) -> Result<Option<SchemaVersion>> {
    let system = buckets::system();
    if !txn.bucket_exists(&system)? {
        return Ok(None);
    }
    let Some(raw) = txn.get_raw(&system, buckets::VERSION_KEY)? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&raw);
    text.parse().map(Some)
}

fn write_version(txn: &WriteTransaction, version: SchemaVersion) -> Result<()> {
    txn.put_raw(&buckets::system(), buckets::VERSION_KEY, version.to_string().as_bytes())
}

/// Checks the stored version against [`REQUIRED_VERSION`] without changing
/// anything. A new store passes.
///
/// # Errors
///
/// Returns `SchemaUpdateRequired` for an older store and
/// `SchemaVersionHigher` for a newer one.
pub fn check_version(store: &Store) -> Result<()> {
    match current_version(store)? {
        None => Ok(()),
        Some(current) if current == REQUIRED_VERSION => Ok(()),
        Some(current) if current < REQUIRED_VERSION => Err(StoreError::SchemaUpdateRequired {
            current: current.to_string(),
            required: REQUIRED_VERSION.to_string(),
        }),
        Some(current) => Err(StoreError::SchemaVersionHigher {
            current: current.to_string(),
            required: REQUIRED_VERSION.to_string(),
        }),
    }
}

/// Brings the store to [`REQUIRED_VERSION`] at open.
///
/// New stores are initialized. Older stores are migrated when
/// `auto_migrate` is set and rejected otherwise. Newer stores are always
/// rejected.
///
/// # Errors
///
/// Returns `SchemaUpdateRequired`, `SchemaVersionHigher`, or `Migration`
/// for a failed step.
pub fn ensure(store: &Store, auto_migrate: bool) -> Result<MigrationReport> {
    match current_version(store)? {
        None => initialize(store),
        Some(current) if current == REQUIRED_VERSION => Ok(MigrationReport::unchanged(current)),
        Some(current) if current > REQUIRED_VERSION => Err(StoreError::SchemaVersionHigher {
            current: current.to_string(),
            required: REQUIRED_VERSION.to_string(),
        }),
        Some(current) if auto_migrate => migrate_from(store, current),
        Some(current) => Err(StoreError::SchemaUpdateRequired {
            current: current.to_string(),
            required: REQUIRED_VERSION.to_string(),
        }),
    }
}

/// Runs every pending step up to [`REQUIRED_VERSION`]. A store already at
/// the required version is left untouched.
///
/// # Errors
///
/// Returns `SchemaVersionHigher` for a newer store, or `Migration` for a
/// failed step.
pub fn migrate(store: &Store) -> Result<MigrationReport> {
    match current_version(store)? {
        None => initialize(store),
        Some(current) if current > REQUIRED_VERSION => Err(StoreError::SchemaVersionHigher {
            current: current.to_string(),
            required: REQUIRED_VERSION.to_string(),
        }),
        Some(current) => migrate_from(store, current),
    }
}

fn initialize(store: &Store) -> Result<MigrationReport> {
    let txn = store.write()?;
    steps::create_required_buckets(&txn)?;
    write_version(&txn, REQUIRED_VERSION)?;
    txn.commit()?;
    info!(version = %REQUIRED_VERSION, "Initialized store");
    Ok(MigrationReport {
        from: None,
        to: REQUIRED_VERSION,
        applied: Vec::new(),
        backups: Vec::new(),
    })
}

fn migrate_from(store: &Store, start: SchemaVersion) -> Result<MigrationReport> {
    let mut report = MigrationReport::unchanged(start);
    let mut current = start;
    while current < REQUIRED_VERSION {
        let Some(step) = steps::STEPS.iter().find(|s| s.from == current) else {
            return Err(StoreError::InvalidVersion { version: current.to_string() });
        };
        let backup = run_step(store, step)
            .context(MigrationSnafu { from: step.from.to_string(), to: step.to.to_string() })
            .inspect_err(|e| {
                warn!(from = %step.from, to = %step.to, error = %e, "Migration step failed");
            })?;
        report.applied.push(step.to);
        report.backups.extend(backup);
        current = step.to;
        report.to = current;
    }
    Ok(report)
}

// The step error is boxed by the caller's context selector.
fn run_step(store: &Store, step: &steps::Step) -> std::result::Result<Option<PathBuf>, Box<StoreError>> {
    let (backup, backup_file) = match store.path() {
        Some(db_path) => {
            let dest = backup_path(db_path, step.from);
            (store.backup_to(&dest)?, Some(dest))
        },
        None => (store.snapshot()?, None),
    };
    info!(from = %step.from, to = %step.to, backup = ?backup_file, "Migrating store");

    let source = backup.read()?;
    let live = store.write()?;
    (step.transform)(&source, &live)?;
    write_version(&live, step.to)?;
    live.commit()?;
    Ok(backup_file)
}
