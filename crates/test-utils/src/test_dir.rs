//! Scratch directories holding a store and its sidecar files.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

/// Temporary directory removed on drop.
pub struct TestDir(tempfile::TempDir);

impl TestDir {
    #[must_use]
    pub fn new() -> Self {
        Self(tempfile::tempdir().expect("create scratch directory"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }

    /// `<dir>/<name>`.
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path().join(name)
    }

    /// `<dir>/<db>.<suffix>`, e.g. the `reldir.db.sync` watermark file.
    #[must_use]
    pub fn sidecar(&self, db: &str, suffix: &str) -> PathBuf {
        self.join(format!("{db}.{suffix}"))
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
