//! Sync checkpoint stored next to the database file.
//!
//! The file is `<db-path>.sync` and holds one JSON object:
//!
//! ```json
//! {"last_updated":"2026-01-02T03:04:05Z","ts":{"seconds":1767323045,"nanos":0},
//!  "count":42,"obj_count":30,"rel_count":12}
//! ```

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use prost_types::Timestamp;
use reldir_types::convert;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;

use crate::error::{Result, WatermarkFormatSnafu, WatermarkIoSnafu};

/// Timestamp as stored in the watermark file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkTs {
    pub seconds: i64,
    pub nanos: i32,
}

impl From<Timestamp> for WatermarkTs {
    fn from(ts: Timestamp) -> Self {
        Self { seconds: ts.seconds, nanos: ts.nanos }
    }
}

impl From<WatermarkTs> for Timestamp {
    fn from(ts: WatermarkTs) -> Self {
        Timestamp { seconds: ts.seconds, nanos: ts.nanos }
    }
}

/// High-water mark of the last successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// `ts` in RFC 3339, for people reading the file.
    #[serde(default)]
    pub last_updated: String,
    pub ts: WatermarkTs,
    /// Total entries held after the run.
    pub count: u64,
    pub obj_count: u64,
    pub rel_count: u64,
}

impl Watermark {
    pub fn new(ts: Timestamp, obj_count: u64, rel_count: u64) -> Self {
        let last_updated =
            convert::from_timestamp(&ts).map(|dt| dt.to_rfc3339()).unwrap_or_default();
        Self {
            last_updated,
            ts: ts.into(),
            count: obj_count + rel_count,
            obj_count,
            rel_count,
        }
    }

    /// Start point for the next incremental stream.
    pub fn timestamp(&self) -> Timestamp {
        self.ts.into()
    }

    /// Reads the watermark; a missing file is `None`.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkIo` or `WatermarkFormat` for an unreadable file.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(source).context(WatermarkIoSnafu { path }),
        };
        serde_json::from_slice(&bytes).context(WatermarkFormatSnafu { path }).map(Some)
    }

    /// Writes the watermark through a temporary file and rename.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkIo` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self).context(WatermarkFormatSnafu { path })?;
        let tmp = sibling(path, ".tmp");
        std::fs::write(&tmp, bytes).context(WatermarkIoSnafu { path: &tmp })?;
        std::fs::rename(&tmp, path).context(WatermarkIoSnafu { path })?;
        debug!(path = %path.display(), count = self.count, "Saved watermark");
        Ok(())
    }
}

/// Watermark location for the store at `db_path`.
pub fn path_for(db_path: &Path) -> PathBuf {
    sibling(db_path, ".sync")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
