//! Object and relation directory for reldir.
//!
//! [`Directory`] is the service entry point. It provides:
//! - Object and relation writes with etags and optimistic concurrency
//! - Relation tuples kept in an object-primary and a subject-primary index
//! - Paginated reads and filtered relation queries
//! - The manifest and its compiled model, swapped atomically on update
//! - Single and batched checks, graph expansion and stats
//! - Transactional import and streaming export
//!
//! The model itself sits behind [`ModelCompiler`] and [`ModelCache`];
//! [`ManifestCompiler`] is the built-in JSON manifest implementation.

#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::disallowed_methods))]

mod check;
mod directory;
mod error;
mod export;
mod graph;
mod import;
mod manifest;
pub mod metadata;
pub mod metrics;
mod model;
mod object;
mod relation;
mod stats;

pub use directory::{Directory, ObjectWithRelations, RelationWithObjects, RelationsPage};
pub use error::{DirectoryError, Result};
pub use export::export_options;
pub use graph::{GraphCache, ManifestCompiler, WILDCARD};
pub use import::{ImportCounters, ImportFailure, ImportOp, ImportReport};
pub use metadata::{SetOutcome, Stamped};
pub use model::{LoadedModel, ModelCache, ModelCompiler, RelationReader, TxnReader};
pub use object::DeleteOutcome;
