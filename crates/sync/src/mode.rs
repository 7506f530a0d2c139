//! Sync mode flags.

use std::{fmt, str::FromStr};

use crate::error::SyncError;

/// Set of sync modes.
///
/// `DIFF` and `WATERMARK` each imply `FULL`. A watermark-bounded stream
/// cannot prove that an entry is gone, so when both are requested the run
/// uses diff and ignores the watermark as a start point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mode(u8);

impl Mode {
    /// Sync the manifest only.
    pub const MANIFEST: Mode = Mode(1);
    /// Stream and upsert all objects and relations.
    pub const FULL: Mode = Mode(1 << 1);
    /// Full, then delete local entries the remote did not send.
    pub const DIFF: Mode = Mode(1 << 2 | 1 << 1);
    /// Full, restricted to entries updated since the last run.
    pub const WATERMARK: Mode = Mode(1 << 3 | 1 << 1);

    const NAMES: [(&'static str, Mode); 4] = [
        ("manifest", Self::MANIFEST),
        ("full", Self::FULL),
        ("diff", Self::DIFF),
        ("watermark", Self::WATERMARK),
    ];

    pub const fn empty() -> Self {
        Mode(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag of `other` is set.
    pub const fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Mode) -> Mode {
        Mode(self.0 | other.0)
    }

    /// Whether the run streams data.
    pub const fn streams_data(self) -> bool {
        self.contains(Self::FULL)
    }

    /// Whether the run deletes entries missing remotely.
    pub const fn diff(self) -> bool {
        self.contains(Self::DIFF)
    }

    /// Whether the stream starts at the stored watermark. False when diff is
    /// also requested.
    pub const fn from_watermark(self) -> bool {
        self.contains(Self::WATERMARK) && !self.diff()
    }

    /// Whether both diff and watermark were requested.
    pub const fn conflicting(self) -> bool {
        self.contains(Self::WATERMARK) && self.diff()
    }
}

impl std::ops::BitOr for Mode {
    type Output = Mode;

    fn bitor(self, rhs: Mode) -> Mode {
        self.union(rhs)
    }
}

impl FromStr for Mode {
    type Err = SyncError;

    /// Parses comma-separated names such as `manifest,diff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',').map(str::trim).filter(|name| !name.is_empty()).try_fold(
            Mode::empty(),
            |acc, name| {
                Self::NAMES
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, mode)| acc | *mode)
                    .ok_or_else(|| SyncError::InvalidMode { mode: name.to_string() })
            },
        )
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, mode) in Self::NAMES {
            // FULL is implied by DIFF and WATERMARK; print it only on its own.
            let implied = mode == Self::FULL && (self.diff() || self.contains(Self::WATERMARK));
            if self.contains(mode) && !implied {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
