//! Page-token pagination over prefix scans.
//!
//! A continuation token is the raw key of the first entry of the next page,
//! encoded as URL-safe base64 without padding. Tokens are only valid for the
//! prefix that produced them.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reldir_types::Codec;

use crate::{
    cursor::Cursor,
    error::{Result, StoreError},
    path::Path,
    txn::ReadTxn,
};

/// Page size used when a request asks for 0.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Requested page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
    /// Entries per page; 0 means [`DEFAULT_PAGE_SIZE`].
    pub size: u32,
    /// Continuation token from a previous page; empty starts at the beginning.
    pub token: String,
}

impl PageOptions {
    /// First page of `size` entries.
    pub fn new(size: u32) -> Self {
        Self { size, token: String::new() }
    }

    /// Continues from `token`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Page size after applying the default and clamping to `max`.
    pub fn effective_size(&self, max: u32) -> usize {
        let max = max.max(1);
        let size = if self.size == 0 { DEFAULT_PAGE_SIZE } else { self.size };
        size.min(max) as usize
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Entries in key order.
    pub results: Vec<T>,
    /// Token for the next page; empty when there are no more entries.
    pub next_token: String,
}

impl<T> Page<T> {
    /// Whether another page follows.
    pub fn has_more(&self) -> bool {
        !self.next_token.is_empty()
    }

    /// Transforms the results, keeping the token.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { results: self.results.into_iter().map(f).collect(), next_token: self.next_token }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { results: Vec::new(), next_token: String::new() }
    }
}

/// Encodes a raw key as a continuation token.
pub fn encode_token(key: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

/// Decodes a continuation token and checks it lies under `prefix`.
///
/// # Errors
///
/// Returns `InvalidPageToken` if the token is not base64 or does not start
/// with `prefix`.
pub fn decode_token(token: &str, prefix: &[u8]) -> Result<Vec<u8>> {
    let key = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| StoreError::InvalidPageToken { message: e.to_string() })?;
    if !key.starts_with(prefix) {
        return Err(StoreError::InvalidPageToken {
            message: "token does not belong to this query".to_string(),
        });
    }
    Ok(key)
}

/// Reads one page of entries under `prefix`.
///
/// `select` receives each key with its decoded value and returns `Some` for
/// entries that belong in the result. Rejected entries do not count towards
/// the page size. After the page is full the
/// scan continues to the next selected entry, whose key becomes the token,
/// so `next_token` is non-empty only when another non-empty page exists.
///
/// # Errors
///
/// Returns `InvalidPageToken`, `PathNotFound`, decode errors, or any error
/// from `select`.
pub fn paginate<M, T, R, F>(
    txn: &R,
    path: &Path,
    prefix: &[u8],
    options: &PageOptions,
    max_page_size: u32,
    mut select: F,
) -> Result<Page<T>>
where
    M: Codec,
    R: ReadTxn + ?Sized,
    F: FnMut(&[u8], M) -> Result<Option<T>>,
{
    let size = options.effective_size(max_page_size);
    let start =
        if options.token.is_empty() { prefix.to_vec() } else { decode_token(&options.token, prefix)? };

    let mut cursor = Cursor::seek(txn, path, prefix, &start)?;
    let mut page = Page { results: Vec::with_capacity(size), next_token: String::new() };
    while cursor.advance()? {
        let (Some(key), Some(msg)) = (cursor.key(), cursor.decode::<M>()?) else {
            break;
        };
        let key = key.to_vec();
        let Some(item) = select(&key, msg)? else {
            continue;
        };
        if page.results.len() == size {
            page.next_token = encode_token(&key);
            break;
        }
        page.results.push(item);
    }
    Ok(page)
}
