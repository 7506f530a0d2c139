//! Shared test utilities for reldir crates.
//!
//! - [`TestDir`] - managed temporary directory with path helpers
//! - [`fixtures`] - object/relation builders and sample manifest bodies
//! - [`strategies`] - proptest generators for directory entities

#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::disallowed_methods))]

pub mod fixtures;
pub mod strategies;
mod test_dir;

pub use test_dir::TestDir;
