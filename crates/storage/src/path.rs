//! Bucket addressing.
//!
//! A [`Path`] names a bucket as a sequence of segments. Each bucket maps to
//! one redb table named by the segments joined with `/`, so the nested
//! namespace `_manifest` → `default` lives in table `_manifest/default`.

use std::fmt;

use crate::error::{Result, StoreError};

const SEPARATOR: char = '/';

/// Location of a bucket in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Builds a path from segments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if there are no segments, or a segment is
    /// empty or contains `/`.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let path = Self { segments };
        path.validate()?;
        Ok(path)
    }

    /// Parses a table name back into a path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for empty names or empty segments.
    pub fn from_table_name(name: &str) -> Result<Self> {
        Self::new(name.split(SEPARATOR))
    }

    /// Returns a child path with one more segment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if `segment` is empty or contains `/`.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `self` equals `other` or is nested below it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Name of the backing redb table.
    pub fn table_name(&self) -> String {
        self.segments.join("/")
    }

    fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(StoreError::InvalidPath {
                path: String::new(),
                message: "path has no segments".to_string(),
            });
        }
        for segment in &self.segments {
            if segment.is_empty() || segment.contains(SEPARATOR) {
                return Err(StoreError::InvalidPath {
                    path: self.table_name(),
                    message: format!("segment {segment:?} is empty or contains '/'"),
                });
            }
        }
        Ok(())
    }

    fn well_known(segments: &[&str]) -> Self {
        Self { segments: segments.iter().map(|s| (*s).to_string()).collect() }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

/// Well-known buckets and keys of the on-disk layout.
pub mod buckets {
    use super::Path;
    use crate::error::Result;

    /// System bucket name.
    pub const SYSTEM: &str = "_system";
    /// Manifest bucket name.
    pub const MANIFEST: &str = "_manifest";
    /// Object bucket name.
    pub const OBJECTS: &str = "objects";
    /// Object-primary relation index bucket name.
    pub const RELATIONS_OBJ: &str = "relations_obj";
    /// Subject-primary relation index bucket name.
    pub const RELATIONS_SUB: &str = "relations_sub";

    /// Schema version key in the system bucket.
    pub const VERSION_KEY: &[u8] = b"version";
    /// Manifest metadata key.
    pub const MANIFEST_METADATA_KEY: &[u8] = b"metadata";
    /// Manifest body key.
    pub const MANIFEST_BODY_KEY: &[u8] = b"body";
    /// Compiled model key.
    pub const MANIFEST_MODEL_KEY: &[u8] = b"model";

    /// `_system`
    pub fn system() -> Path {
        Path::well_known(&[SYSTEM])
    }

    /// `objects`
    pub fn objects() -> Path {
        Path::well_known(&[OBJECTS])
    }

    /// `relations_obj`
    pub fn relations_obj() -> Path {
        Path::well_known(&[RELATIONS_OBJ])
    }

    /// `relations_sub`
    pub fn relations_sub() -> Path {
        Path::well_known(&[RELATIONS_SUB])
    }

    /// `_manifest/<name>`
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if `name` is empty or contains `/`.
    pub fn manifest(name: &str) -> Result<Path> {
        Path::new([MANIFEST, name])
    }

    /// Buckets every initialized store has.
    pub fn required() -> [Path; 4] {
        [system(), objects(), relations_obj(), relations_sub()]
    }
}
