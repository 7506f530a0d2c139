//! Directory statistics computed from keys alone.

use reldir_store::{Cursor, Direction, ReadTxn, buckets, keys};
use reldir_types::{Relation, Stats};

use crate::error::Result;

/// Counts objects per type and relations per object type, relation and
/// subject type. Values are never decoded.
pub(crate) fn collect<T: ReadTxn + ?Sized>(txn: &T) -> Result<Stats> {
    let mut stats = Stats::default();

    let objects = buckets::objects();
    if txn.bucket_exists(&objects)? {
        let mut cursor = Cursor::new(txn, &objects, &[])?;
        while cursor.advance()? {
            if let Some(key) = cursor.key() {
                let id = keys::parse_object_key(key)?;
                stats.add_object(&id.object_type);
            }
        }
    }

    let direction = Direction::ObjectToSubject;
    let relations = direction.bucket();
    if txn.bucket_exists(&relations)? {
        let mut cursor = Cursor::new(txn, &relations, &[])?;
        while cursor.advance()? {
            if let Some(key) = cursor.key() {
                let id = keys::parse_relation_key(direction, key)?;
                stats.add_relation(&Relation {
                    object_type: id.object_type,
                    object_id: id.object_id,
                    relation: id.relation,
                    subject_type: id.subject_type,
                    subject_id: id.subject_id,
                    subject_relation: id.subject_relation,
                    ..Relation::default()
                });
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use prost_types::Timestamp;
    use reldir_store::{KeyBufferPool, Store, migrate};
    use reldir_test_utils::fixtures;

    use super::*;
    use crate::{object::ObjectStore, relation::RelationStore};

    #[test]
    fn test_counts_by_type_and_subject() {
        let store = Store::in_memory().expect("open");
        migrate::ensure(&store, true).expect("init");
        let pool = KeyBufferPool::default();
        let now = Timestamp::default();
        store
            .update(|txn| -> Result<()> {
                for (t, id) in [("user", "a"), ("user", "b"), ("group", "eng")] {
                    ObjectStore::set(txn, &pool, fixtures::object(t, id), now.clone())?;
                }
                for rel in [
                    fixtures::relation(("group", "eng"), "member", ("user", "a")),
                    fixtures::relation(("group", "eng"), "member", ("user", "b")),
                    fixtures::subject_set(("group", "all"), "member", ("group", "eng"), "member"),
                ] {
                    RelationStore::set(txn, &pool, rel, now.clone())?;
                }
                Ok(())
            })
            .expect("seed");

        let stats = collect(&store.read().expect("read")).expect("stats");
        assert_eq!(stats.total_objects(), 3);
        assert_eq!(stats.total_relations(), 3);
        let member = &stats.object_types["group"].relations["member"];
        assert_eq!(member.subjects["user"], 2);
        assert_eq!(member.subjects["group#member"], 1);
    }

    #[test]
    fn test_empty_store() {
        let store = Store::in_memory().expect("open");
        let stats = collect(&store.read().expect("read")).expect("stats");
        assert_eq!(stats, Stats::default());
    }
}
