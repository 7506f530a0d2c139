//! Embedded bucket store for the reldir directory.
//!
//! This crate provides:
//! - redb-backed storage with named buckets addressed by [`Path`]
//! - Read and write transaction traits ([`ReadTxn`], [`WriteTxn`])
//! - A typed codec layer over raw bucket entries ([`typed`])
//! - Object and relation key encodings in both index orders ([`keys`])
//! - Cursors and page-token pagination ([`Cursor`], [`page`])
//! - Versioned schema migration run at open ([`migrate`])

mod cursor;
mod engine;
mod error;
pub mod keys;
pub mod migrate;
pub mod page;
mod path;
mod txn;
pub mod typed;

pub use cursor::Cursor;
pub use engine::Store;
pub use error::{Result, StoreError, display_key};
pub use keys::{Direction, KeyBufferPool, PooledBuffer};
pub use page::{DEFAULT_PAGE_SIZE, Page, PageOptions};
pub use path::{Path, buckets};
pub use txn::{ReadTransaction, ReadTxn, WriteTransaction, WriteTxn};
