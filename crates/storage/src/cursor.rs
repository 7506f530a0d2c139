//! Ordered cursor over one bucket.

use std::{collections::VecDeque, ops::Bound};

use reldir_types::Codec;
use snafu::ResultExt;

use crate::{
    error::{CodecSnafu, Result, display_key},
    path::Path,
    txn::ReadTxn,
};

/// Entries fetched from redb per refill.
const CHUNK_SIZE: usize = 256;

#[derive(Debug)]
enum Resume {
    At(Vec<u8>),
    After(Vec<u8>),
    Done,
}

/// Single-pass iterator over a bucket in key order, limited to a key prefix.
///
/// Entries are read from the transaction in chunks, and each chunk re-opens
/// the bucket, so writes through the same transaction may interleave with
/// iteration. Values are decoded on demand with [`decode`](Self::decode).
pub struct Cursor<'t, T: ReadTxn + ?Sized> {
    txn: &'t T,
    path: Path,
    prefix: Vec<u8>,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    resume: Resume,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl<'t, T: ReadTxn + ?Sized> Cursor<'t, T> {
    /// Creates a cursor positioned before the first key with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the bucket does not exist.
    pub fn new(txn: &'t T, path: &Path, prefix: &[u8]) -> Result<Self> {
        Self::seek(txn, path, prefix, prefix)
    }

    /// Creates a cursor positioned before `start`, limited to `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the bucket does not exist.
    pub fn seek(txn: &'t T, path: &Path, prefix: &[u8], start: &[u8]) -> Result<Self> {
        if !txn.bucket_exists(path)? {
            return Err(crate::StoreError::PathNotFound { path: path.table_name() });
        }
        Ok(Self {
            txn,
            path: path.clone(),
            prefix: prefix.to_vec(),
            buffer: VecDeque::new(),
            resume: Resume::At(start.to_vec()),
            current: None,
        })
    }

    /// Moves to the next entry. Returns `false` once the prefix is exhausted.
    ///
    /// # Errors
    ///
    /// Returns any storage error raised while reading the next chunk.
    pub fn advance(&mut self) -> Result<bool> {
        self.current = None;
        if !self.fill()? {
            return Ok(false);
        }
        self.current = self.buffer.pop_front();
        Ok(self.current.is_some())
    }

    /// Key of the next entry without consuming it.
    ///
    /// # Errors
    ///
    /// Returns any storage error raised while reading the next chunk.
    pub fn peek_key(&mut self) -> Result<Option<&[u8]>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.buffer.front().map(|(k, _)| k.as_slice()))
    }

    /// Key of the current entry.
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// Raw value of the current entry.
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, v)| v.as_slice())
    }

    /// Decodes the current value.
    ///
    /// Returns `Ok(None)` when the cursor is not positioned on an entry.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the value does not decode as `M`.
    pub fn decode<M: Codec>(&self) -> Result<Option<M>> {
        let Some((key, value)) = &self.current else {
            return Ok(None);
        };
        M::decode(value)
            .context(CodecSnafu { path: self.path.table_name(), key: display_key(key) })
            .map(Some)
    }

    /// Ensures the buffer holds the next in-prefix entry, if there is one.
    fn fill(&mut self) -> Result<bool> {
        if self.buffer.is_empty() {
            let start = match &self.resume {
                Resume::At(key) => Bound::Included(key.as_slice()),
                Resume::After(key) => Bound::Excluded(key.as_slice()),
                Resume::Done => return Ok(false),
            };
            let chunk = self.txn.range_raw(&self.path, start, CHUNK_SIZE)?;
            self.resume = match chunk.last() {
                Some((last, _)) if chunk.len() == CHUNK_SIZE => Resume::After(last.clone()),
                _ => Resume::Done,
            };
            self.buffer.extend(chunk);
        }
        match self.buffer.front() {
            Some((key, _)) if key.starts_with(&self.prefix) => Ok(true),
            Some(_) => {
                self.buffer.clear();
                self.resume = Resume::Done;
                Ok(false)
            },
            None => Ok(false),
        }
    }
}

impl<T: ReadTxn + ?Sized> std::fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &self.path)
            .field("prefix", &display_key(&self.prefix))
            .field("resume", &self.resume)
            .finish_non_exhaustive()
    }
}
