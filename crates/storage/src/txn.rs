//! Transaction wrappers and the raw bucket access traits.
//!
//! All bucket tables use `&[u8]` keys and values. Tables are opened per call
//! and dropped before returning, so a cursor can keep reading a bucket while
//! the same write transaction inserts into or deletes from it.

use std::ops::Bound;

use redb::{ReadableTable, ReadableTableMetadata, TableDefinition, TableError, TableHandle};
use snafu::ResultExt;

use crate::{
    error::{CommitSnafu, Result, StorageSnafu, StoreError, TableSnafu},
    path::Path,
};

type Bytes = &'static [u8];

fn definition(name: &str) -> TableDefinition<'_, Bytes, Bytes> {
    TableDefinition::new(name)
}

/// Read access to buckets, implemented by both transaction kinds.
pub trait ReadTxn {
    /// Reads one raw value.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the bucket does not exist.
    fn get_raw(&self, path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Whether the bucket exists.
    fn bucket_exists(&self, path: &Path) -> Result<bool>;

    /// Reads up to `limit` entries in key order, starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the bucket does not exist.
    fn range_raw(
        &self,
        path: &Path,
        start: Bound<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Number of entries in the bucket; 0 when it does not exist.
    fn bucket_len(&self, path: &Path) -> Result<u64>;

    /// Every bucket in the store.
    fn buckets(&self) -> Result<Vec<Path>>;
}

/// Write access to buckets.
pub trait WriteTxn: ReadTxn {
    /// Inserts or overwrites a raw value, creating the bucket if needed.
    fn put_raw(&self, path: &Path, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key. Returns whether it existed; a missing bucket is not an error.
    fn delete_raw(&self, path: &Path, key: &[u8]) -> Result<bool>;

    /// Creates an empty bucket if it does not exist.
    fn create_bucket(&self, path: &Path) -> Result<()>;

    /// Drops a bucket and all its entries. Returns whether it existed.
    fn delete_bucket(&self, path: &Path) -> Result<bool>;
}

fn collect_range<T>(
    table: &T,
    start: Bound<&[u8]>,
    limit: usize,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>>
where
    T: ReadableTable<Bytes, Bytes>,
{
    let mut out = Vec::with_capacity(limit.min(1024));
    if limit == 0 {
        return Ok(out);
    }
    let range = table.range::<&[u8]>((start, Bound::Unbounded)).context(StorageSnafu)?;
    for entry in range {
        let (key, value) = entry.context(StorageSnafu)?;
        out.push((key.value().to_vec(), value.value().to_vec()));
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}

fn path_not_found(path: &Path) -> StoreError {
    StoreError::PathNotFound { path: path.table_name() }
}

/// Read-only snapshot transaction.
pub struct ReadTransaction {
    inner: redb::ReadTransaction,
}

impl ReadTransaction {
    pub(crate) fn new(inner: redb::ReadTransaction) -> Self {
        Self { inner }
    }

    fn open(&self, path: &Path) -> Result<Option<redb::ReadOnlyTable<Bytes, Bytes>>> {
        let name = path.table_name();
        match self.inner.open_table(definition(&name)) {
            Ok(table) => Ok(Some(table)),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e).context(TableSnafu),
        }
    }
}

impl ReadTxn for ReadTransaction {
    fn get_raw(&self, path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.open(path)?.ok_or_else(|| path_not_found(path))?;
        let value = table.get(key).context(StorageSnafu)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn bucket_exists(&self, path: &Path) -> Result<bool> {
        Ok(self.open(path)?.is_some())
    }

    fn range_raw(
        &self,
        path: &Path,
        start: Bound<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.open(path)?.ok_or_else(|| path_not_found(path))?;
        collect_range(&table, start, limit)
    }

    fn bucket_len(&self, path: &Path) -> Result<u64> {
        match self.open(path)? {
            Some(table) => table.len().context(StorageSnafu),
            None => Ok(0),
        }
    }

    fn buckets(&self) -> Result<Vec<Path>> {
        let tables = self.inner.list_tables().context(StorageSnafu)?;
        tables.map(|handle| Path::from_table_name(handle.name())).collect()
    }
}

/// Read-write transaction. Changes are discarded unless [`commit`](Self::commit) is called.
pub struct WriteTransaction {
    inner: redb::WriteTransaction,
}

impl WriteTransaction {
    pub(crate) fn new(inner: redb::WriteTransaction) -> Self {
        Self { inner }
    }

    /// Commits all changes made in this transaction.
    ///
    /// # Errors
    ///
    /// Returns `Commit` if redb fails to persist the transaction.
    pub fn commit(self) -> Result<()> {
        self.inner.commit().context(CommitSnafu)
    }

    /// Discards all changes made in this transaction.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if redb fails to release the transaction.
    pub fn abort(self) -> Result<()> {
        self.inner.abort().context(StorageSnafu)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let mut tables = self.inner.list_tables().context(StorageSnafu)?;
        Ok(tables.any(|handle| handle.name() == name))
    }

    // Opening a table in a write transaction creates it, so existence is
    // checked first for every read-side call.
    fn open_existing(&self, path: &Path) -> Result<Option<redb::Table<'_, Bytes, Bytes>>> {
        let name = path.table_name();
        if !self.exists(&name)? {
            return Ok(None);
        }
        self.inner.open_table(definition(&name)).context(TableSnafu).map(Some)
    }
}

impl ReadTxn for WriteTransaction {
    fn get_raw(&self, path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self.open_existing(path)?.ok_or_else(|| path_not_found(path))?;
        let value = table.get(key).context(StorageSnafu)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn bucket_exists(&self, path: &Path) -> Result<bool> {
        self.exists(&path.table_name())
    }

    fn range_raw(
        &self,
        path: &Path,
        start: Bound<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self.open_existing(path)?.ok_or_else(|| path_not_found(path))?;
        collect_range(&table, start, limit)
    }

    fn bucket_len(&self, path: &Path) -> Result<u64> {
        match self.open_existing(path)? {
            Some(table) => table.len().context(StorageSnafu),
            None => Ok(0),
        }
    }

    fn buckets(&self) -> Result<Vec<Path>> {
        let tables = self.inner.list_tables().context(StorageSnafu)?;
        tables.map(|handle| Path::from_table_name(handle.name())).collect()
    }
}

impl WriteTxn for WriteTransaction {
    fn put_raw(&self, path: &Path, key: &[u8], value: &[u8]) -> Result<()> {
        let name = path.table_name();
        let mut table = self.inner.open_table(definition(&name)).context(TableSnafu)?;
        table.insert(key, value).context(StorageSnafu)?;
        Ok(())
    }

    fn delete_raw(&self, path: &Path, key: &[u8]) -> Result<bool> {
        let Some(mut table) = self.open_existing(path)? else {
            return Ok(false);
        };
        let removed = table.remove(key).context(StorageSnafu)?;
        Ok(removed.is_some())
    }

    fn create_bucket(&self, path: &Path) -> Result<()> {
        let name = path.table_name();
        self.inner.open_table(definition(&name)).context(TableSnafu)?;
        Ok(())
    }

    fn delete_bucket(&self, path: &Path) -> Result<bool> {
        let name = path.table_name();
        self.inner.delete_table(definition(&name)).context(TableSnafu)
    }
}
