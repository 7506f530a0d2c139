//! Etag and timestamp stamping shared by object and relation writes.
//!
//! The etag of an entity is the hash of its encoding with `etag`,
//! `created_at` and `updated_at` cleared. On write the incoming `etag` field
//! is the caller's expected etag: empty means unconditional.

use prost_types::Timestamp;
use reldir_types::{Object, Relation, convert, object_etag, relation_etag};

use crate::error::{DirectoryError, Result};

/// Entity carrying server-stamped metadata.
pub trait Stamped: Clone {
    /// Short name used in errors and metrics.
    const KIND: &'static str;

    fn etag(&self) -> &str;
    fn set_etag(&mut self, etag: String);
    fn created_at(&self) -> Option<&Timestamp>;
    fn set_created_at(&mut self, ts: Option<Timestamp>);
    fn updated_at(&self) -> Option<&Timestamp>;
    fn set_updated_at(&mut self, ts: Option<Timestamp>);

    /// Content hash, ignoring metadata.
    fn content_etag(&self) -> String;
}

impl Stamped for Object {
    const KIND: &'static str = "object";

    fn etag(&self) -> &str {
        &self.etag
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = etag;
    }

    fn created_at(&self) -> Option<&Timestamp> {
        self.created_at.as_ref()
    }

    fn set_created_at(&mut self, ts: Option<Timestamp>) {
        self.created_at = ts;
    }

    fn updated_at(&self) -> Option<&Timestamp> {
        self.updated_at.as_ref()
    }

    fn set_updated_at(&mut self, ts: Option<Timestamp>) {
        self.updated_at = ts;
    }

    fn content_etag(&self) -> String {
        object_etag(self)
    }
}

impl Stamped for Relation {
    const KIND: &'static str = "relation";

    fn etag(&self) -> &str {
        &self.etag
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = etag;
    }

    fn created_at(&self) -> Option<&Timestamp> {
        self.created_at.as_ref()
    }

    fn set_created_at(&mut self, ts: Option<Timestamp>) {
        self.created_at = ts;
    }

    fn updated_at(&self) -> Option<&Timestamp> {
        self.updated_at.as_ref()
    }

    fn set_updated_at(&mut self, ts: Option<Timestamp>) {
        self.updated_at = ts;
    }

    fn content_etag(&self) -> String {
        relation_etag(self)
    }
}

/// Result of preparing a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared<T> {
    /// Content matches the stored value; nothing to write.
    Unchanged(T),
    /// Stamped value to write.
    Write(T),
}

/// Outcome of a set operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome<T> {
    /// The value now stored.
    pub value: T,
    /// Whether anything was written.
    pub written: bool,
}

impl<T> From<Prepared<T>> for SetOutcome<T> {
    fn from(prepared: Prepared<T>) -> Self {
        match prepared {
            Prepared::Unchanged(value) => Self { value, written: false },
            Prepared::Write(value) => Self { value, written: true },
        }
    }
}

/// Checks an expected etag against the stored entity.
///
/// Passes when `expected` is empty or nothing is stored.
///
/// # Errors
///
/// Returns `HashMismatch` when both are present and differ.
pub fn check_precondition<T: Stamped>(key: &str, expected: &str, current: Option<&T>) -> Result<()> {
    match current {
        Some(current) if !expected.is_empty() && expected != current.etag() => {
            Err(DirectoryError::HashMismatch {
                kind: T::KIND,
                key: key.to_string(),
                expected: expected.to_string(),
                current: current.etag().to_string(),
            })
        },
        _ => Ok(()),
    }
}

/// Stamps `incoming` against the stored value.
///
/// `created_at` is kept from the stored value, or set to `now` for a new
/// entity. `updated_at` is only moved when the content hash changed.
///
/// # Errors
///
/// Returns `HashMismatch` if the incoming etag is set and stale.
pub fn prepare<T: Stamped>(
    key: &str,
    mut incoming: T,
    current: Option<T>,
    now: Timestamp,
) -> Result<Prepared<T>> {
    check_precondition(key, incoming.etag(), current.as_ref())?;
    let etag = incoming.content_etag();
    match current {
        Some(current) if current.etag() == etag => Ok(Prepared::Unchanged(current)),
        Some(current) => {
            incoming.set_created_at(current.created_at().cloned().or_else(|| Some(now.clone())));
            incoming.set_updated_at(Some(now));
            incoming.set_etag(etag);
            Ok(Prepared::Write(incoming))
        },
        None => {
            incoming.set_created_at(Some(now.clone()));
            incoming.set_updated_at(Some(now));
            incoming.set_etag(etag);
            Ok(Prepared::Write(incoming))
        },
    }
}

/// Current time as a protobuf timestamp.
pub fn now() -> Timestamp {
    convert::now()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> Timestamp {
        Timestamp { seconds, nanos: 0 }
    }

    fn user(name: &str) -> Object {
        Object { r#type: "user".into(), id: "x".into(), display_name: name.into(), ..Default::default() }
    }

    #[test]
    fn test_new_entity_is_stamped() {
        let Prepared::Write(obj) = prepare("user:x", user("X"), None, ts(10)).expect("prepare") else {
            panic!("expected a write");
        };
        assert_eq!(obj.created_at, Some(ts(10)));
        assert_eq!(obj.updated_at, Some(ts(10)));
        assert_eq!(obj.etag, object_etag(&user("X")));
    }

    #[test]
    fn test_unchanged_content_is_noop() {
        let Prepared::Write(stored) = prepare("user:x", user("X"), None, ts(10)).expect("first")
        else {
            panic!("expected a write");
        };
        let again = prepare("user:x", user("X"), Some(stored.clone()), ts(20)).expect("second");
        assert_eq!(again, Prepared::Unchanged(stored));
    }

    #[test]
    fn test_update_keeps_created_at() {
        let Prepared::Write(stored) = prepare("user:x", user("X"), None, ts(10)).expect("first")
        else {
            panic!("expected a write");
        };
        let mut update = user("Y");
        update.etag = stored.etag.clone();
        let Prepared::Write(updated) =
            prepare("user:x", update, Some(stored.clone()), ts(20)).expect("update")
        else {
            panic!("expected a write");
        };
        assert_eq!(updated.created_at, Some(ts(10)));
        assert_eq!(updated.updated_at, Some(ts(20)));
        assert_ne!(updated.etag, stored.etag);
    }

    #[test]
    fn test_stale_etag_is_rejected() {
        let Prepared::Write(stored) = prepare("user:x", user("X"), None, ts(10)).expect("first")
        else {
            panic!("expected a write");
        };
        let mut update = user("Y");
        update.etag = "12345".into();
        let err = prepare("user:x", update, Some(stored), ts(20)).unwrap_err();
        assert!(err.is_hash_mismatch());
    }

    #[test]
    fn test_expected_etag_ignored_for_new_entity() {
        let mut incoming = user("X");
        incoming.etag = "stale".into();
        assert!(matches!(prepare("user:x", incoming, None, ts(1)), Ok(Prepared::Write(_))));
    }
}
