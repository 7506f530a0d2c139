use std::{fmt, str::FromStr};

use crate::error::StoreError;

/// `major.minor.patch` version of the on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    /// Builds a version from its parts.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidVersion { version: s.to_string() };
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.').map(|p| p.parse::<u32>().map_err(|_| invalid()));
        let version = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(major), Some(minor), Some(patch), None) => Self::new(major?, minor?, patch?),
            _ => return Err(invalid()),
        };
        Ok(version)
    }
}
