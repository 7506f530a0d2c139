//! redb storage engine wrapper.
//!
//! Provides a thin wrapper around redb with:
//! - Database lifecycle management with a lock-wait timeout
//! - In-memory databases for tests
//! - Copy-on-read backups used by schema migration

use std::{
    path::{Path as FsPath, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use redb::{
    Database, DatabaseError, ReadableTable, TableDefinition, TableHandle,
    backends::InMemoryBackend,
};
use reldir_types::config::StoreConfig;
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    error::{IoSnafu, OpenSnafu, Result, StorageSnafu, StoreError, TableSnafu, TransactionSnafu},
    txn::{ReadTransaction, WriteTransaction},
};

/// Poll interval while another process holds the database lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Handle to an open store. Cloning shares the underlying database.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Store {
    /// Opens or creates the database at `config.db_path`.
    ///
    /// The parent directory is created if needed. While another process
    /// holds the file lock, opening is retried until `config.request_timeout`
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the parent directory cannot be created, `Timeout` if
    /// the lock is not released in time, or `Open` for any other redb error.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.db_path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context(IoSnafu { path: parent.display().to_string() })?;
        }

        let started = Instant::now();
        let db = loop {
            match Database::create(&path) {
                Ok(db) => break db,
                Err(DatabaseError::DatabaseAlreadyOpen) => {
                    let waited = started.elapsed();
                    if waited >= config.request_timeout {
                        return Err(StoreError::Timeout {
                            path: path.display().to_string(),
                            waited,
                        });
                    }
                    debug!(path = %path.display(), ?waited, "Database locked, retrying");
                    // Store open is synchronous and runs before any async work.
                    #[allow(clippy::disallowed_methods)]
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                },
                Err(source) => {
                    return Err(source).context(OpenSnafu { path: path.display().to_string() });
                },
            }
        };

        info!(path = %path.display(), "Opened store");
        Ok(Self { db: Arc::new(db), path: Some(path) })
    }

    /// Creates an empty in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `Open` if redb fails to initialize the backend.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .context(OpenSnafu { path: ":memory:".to_string() })?;
        Ok(Self { db: Arc::new(db), path: None })
    }

    /// File path of the store; `None` for in-memory stores.
    pub fn path(&self) -> Option<&FsPath> {
        self.path.as_deref()
    }

    /// Begins a read-only snapshot transaction.
    ///
    /// # Errors
    ///
    /// Returns `Transaction` if redb cannot start the transaction.
    pub fn read(&self) -> Result<ReadTransaction> {
        let txn = self.db.begin_read().context(TransactionSnafu)?;
        Ok(ReadTransaction::new(txn))
    }

    /// Begins the read-write transaction. Blocks while another write
    /// transaction on this store is open.
    ///
    /// # Errors
    ///
    /// Returns `Transaction` if redb cannot start the transaction.
    pub fn write(&self) -> Result<WriteTransaction> {
        let txn = self.db.begin_write().context(TransactionSnafu)?;
        Ok(WriteTransaction::new(txn))
    }

    /// Runs `f` in a read transaction.
    ///
    /// # Errors
    ///
    /// Returns the first error from beginning the transaction or from `f`.
    pub fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&ReadTransaction) -> std::result::Result<T, E>,
    {
        let txn = self.read()?;
        f(&txn)
    }

    /// Runs `f` in a write transaction and commits if it succeeds.
    ///
    /// The transaction is rolled back when `f` returns an error.
    ///
    /// # Errors
    ///
    /// Returns the first error from beginning, `f`, or committing.
    pub fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&WriteTransaction) -> std::result::Result<T, E>,
    {
        let txn = self.write()?;
        let value = f(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Writes a copy of every bucket to a new database file at `dest` and
    /// returns it opened. An existing file at `dest` is replaced.
    ///
    /// The copy is taken inside one read transaction, so it is a consistent
    /// snapshot even while writers are active.
    ///
    /// # Errors
    ///
    /// Returns `Io` if `dest` cannot be replaced, or any redb error.
    pub fn backup_to(&self, dest: &FsPath) -> Result<Store> {
        if dest.exists() {
            std::fs::remove_file(dest).context(IoSnafu { path: dest.display().to_string() })?;
        }
        let db =
            Database::create(dest).context(OpenSnafu { path: dest.display().to_string() })?;
        let entries = self.copy_into(&db)?;
        info!(dest = %dest.display(), entries, "Wrote store backup");
        Ok(Store { db: Arc::new(db), path: Some(dest.to_path_buf()) })
    }

    /// Copies every bucket into a new in-memory store.
    ///
    /// # Errors
    ///
    /// Returns any redb error raised while copying.
    pub fn snapshot(&self) -> Result<Store> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .context(OpenSnafu { path: ":memory:".to_string() })?;
        let entries = self.copy_into(&db)?;
        debug!(entries, "Took in-memory store snapshot");
        Ok(Store { db: Arc::new(db), path: None })
    }

    fn copy_into(&self, dest: &Database) -> Result<u64> {
        let source = self.db.begin_read().context(TransactionSnafu)?;
        let target = dest.begin_write().context(TransactionSnafu)?;
        let mut copied = 0u64;
        let names: Vec<String> = source
            .list_tables()
            .context(StorageSnafu)?
            .map(|handle| handle.name().to_string())
            .collect();
        for name in &names {
            let definition: TableDefinition<'_, &'static [u8], &'static [u8]> =
                TableDefinition::new(name);
            let from = source.open_table(definition).context(TableSnafu)?;
            let mut to = target.open_table(definition).context(TableSnafu)?;
            for entry in from.iter().context(StorageSnafu)? {
                let (key, value) = entry.context(StorageSnafu)?;
                to.insert(key.value(), value.value()).context(StorageSnafu)?;
                copied += 1;
            }
        }
        target.commit().context(crate::error::CommitSnafu)?;
        Ok(copied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use reldir_test_utils::TestDir;

    use super::*;
    use crate::{ReadTxn, WriteTxn, buckets};

    #[test]
    fn test_open_in_memory() {
        let store = Store::in_memory().expect("should open");
        let _read = store.read().expect("should begin read");
        let _write = store.write().expect("should begin write");
        assert!(store.path().is_none());
    }

    #[test]
    fn test_write_and_read() {
        let store = Store::in_memory().expect("should open");
        let objects = buckets::objects();

        {
            let txn = store.write().expect("should begin write");
            txn.put_raw(&objects, b"user\0alice", b"value").expect("put");
            txn.commit().expect("commit");
        }

        let txn = store.read().expect("should begin read");
        let value = txn.get_raw(&objects, b"user\0alice").expect("get");
        assert_eq!(value.as_deref(), Some(&b"value"[..]));
    }

    #[test]
    fn test_dropped_write_rolls_back() {
        let store = Store::in_memory().expect("should open");
        {
            let txn = store.write().expect("begin write");
            txn.put_raw(&buckets::objects(), b"k", b"v").expect("put");
        }
        let txn = store.read().expect("begin read");
        assert!(!txn.bucket_exists(&buckets::objects()).expect("exists"));
    }

    #[test]
    fn test_missing_bucket_is_path_not_found() {
        let store = Store::in_memory().expect("should open");
        let txn = store.read().expect("begin read");
        let err = txn.get_raw(&buckets::objects(), b"k").unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound { .. }));

        let wtxn = store.write().expect("begin write");
        let err = wtxn.get_raw(&buckets::objects(), b"k").unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound { .. }));
        // Reading must not have created the bucket.
        assert!(!wtxn.bucket_exists(&buckets::objects()).expect("exists"));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TestDir::new();
        let config = StoreConfig {
            db_path: dir.join("nested/deeper/reldir.db"),
            ..StoreConfig::default()
        };
        let store = Store::open(&config).expect("open");
        assert_eq!(store.path(), Some(config.db_path.as_path()));
    }

    #[test]
    fn test_second_open_times_out() {
        let dir = TestDir::new();
        let config = StoreConfig {
            db_path: dir.join("locked.db"),
            request_timeout: Duration::from_millis(120),
            ..StoreConfig::default()
        };
        let _first = Store::open(&config).expect("first open");
        let err = Store::open(&config).unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }), "got {err:?}");
    }

    #[test]
    fn test_backup_copies_every_bucket() {
        let dir = TestDir::new();
        let store = Store::in_memory().expect("open");
        let manifest = buckets::manifest("default").expect("path");
        store
            .update(|txn| -> Result<()> {
                txn.put_raw(&buckets::objects(), b"user\0a", b"1")?;
                txn.put_raw(&manifest, b"body", b"types: {}")?;
                Ok(())
            })
            .expect("seed");

        let backup = store.backup_to(&dir.join("backup.db")).expect("backup");
        let txn = backup.read().expect("read backup");
        assert_eq!(txn.get_raw(&buckets::objects(), b"user\0a").expect("get"), Some(b"1".to_vec()));
        assert_eq!(txn.get_raw(&manifest, b"body").expect("get"), Some(b"types: {}".to_vec()));
        assert_eq!(txn.buckets().expect("buckets").len(), 2);
    }
}
