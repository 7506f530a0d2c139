//! Version-specific transforms.
//!
//! Each transform reads from the read-only backup taken before the step and
//! writes into the live store's write transaction.

use reldir_types::{Object, Relation, object_etag, relation_etag};
use tracing::debug;

use super::version::SchemaVersion;
use crate::{
    Cursor,
    error::Result,
    keys::{self, Direction},
    path::buckets,
    txn::{ReadTransaction, ReadTxn, WriteTransaction, WriteTxn},
    typed,
};

pub(crate) type Transform = fn(&ReadTransaction, &WriteTransaction) -> Result<()>;

pub(crate) struct Step {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub transform: Transform,
}

/// Layout with the object bucket and both relation indexes.
pub const V0_0_1: SchemaVersion = SchemaVersion::new(0, 0, 1);
/// Subject-primary index rebuilt from the object-primary index.
pub const V0_0_2: SchemaVersion = SchemaVersion::new(0, 0, 2);
/// Every object and relation carries an etag.
pub const V0_0_3: SchemaVersion = SchemaVersion::new(0, 0, 3);

pub(crate) const STEPS: &[Step] = &[
    Step { from: V0_0_1, to: V0_0_2, transform: rebuild_subject_index },
    Step { from: V0_0_2, to: V0_0_3, transform: stamp_missing_etags },
];

pub(crate) fn create_required_buckets(live: &WriteTransaction) -> Result<()> {
    for path in buckets::required() {
        live.create_bucket(&path)?;
    }
    Ok(())
}

fn rebuild_subject_index(backup: &ReadTransaction, live: &WriteTransaction) -> Result<()> {
    create_required_buckets(live)?;
    let sub = buckets::relations_sub();
    live.delete_bucket(&sub)?;
    live.create_bucket(&sub)?;
    if !backup.bucket_exists(&buckets::relations_obj())? {
        return Ok(());
    }

    let mut cursor = Cursor::new(backup, &buckets::relations_obj(), &[])?;
    let mut buf = Vec::with_capacity(128);
    let mut rebuilt = 0u64;
    while cursor.advance()? {
        let (Some(key), Some(value)) = (cursor.key(), cursor.value()) else {
            break;
        };
        let id = keys::parse_relation_key(Direction::ObjectToSubject, key)?;
        buf.clear();
        keys::write_relation_key(&mut buf, Direction::SubjectToObject, &id);
        live.put_raw(&sub, &buf, value)?;
        rebuilt += 1;
    }
    debug!(rebuilt, "Rebuilt subject-primary relation index");
    Ok(())
}

fn stamp_missing_etags(backup: &ReadTransaction, live: &WriteTransaction) -> Result<()> {
    create_required_buckets(live)?;

    let objects = buckets::objects();
    let mut stamped_objects = 0u64;
    if backup.bucket_exists(&objects)? {
        let mut cursor = Cursor::new(backup, &objects, &[])?;
        while cursor.advance()? {
            let (Some(key), Some(mut object)) = (cursor.key(), cursor.decode::<Object>()?) else {
                break;
            };
            if object.etag.is_empty() {
                object.etag = object_etag(&object);
                typed::set(live, &objects, key, object)?;
                stamped_objects += 1;
            }
        }
    }

    let relations = buckets::relations_obj();
    let mut stamped_relations = 0u64;
    if backup.bucket_exists(&relations)? {
        let mut cursor = Cursor::new(backup, &relations, &[])?;
        while cursor.advance()? {
            let Some(mut relation) = cursor.decode::<Relation>()? else {
                break;
            };
            if relation.etag.is_empty() {
                relation.etag = relation_etag(&relation);
                for direction in Direction::BOTH {
                    let key = keys::relation_key(direction, &relation);
                    typed::set(live, &direction.bucket(), &key, relation.clone())?;
                }
                stamped_relations += 1;
            }
        }
    }
    debug!(stamped_objects, stamped_relations, "Stamped missing etags");
    Ok(())
}
