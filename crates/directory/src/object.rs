//! Object storage operations.

use prost_types::Timestamp;
use reldir_store::{
    KeyBufferPool, Page, PageOptions, ReadTxn, WriteTxn, buckets, keys, page, typed,
};
use reldir_types::{Object, ObjectIdentifier};

use crate::{
    error::Result,
    metadata::{self, Prepared, SetOutcome},
    relation::RelationStore,
};

/// Result of an object delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether the object existed.
    pub existed: bool,
    /// Relations removed by the cascade.
    pub relations: u64,
}

/// Object storage operations.
pub(crate) struct ObjectStore;

impl ObjectStore {
    pub fn get<T: ReadTxn + ?Sized>(txn: &T, pool: &KeyBufferPool, id: &ObjectIdentifier) -> Result<Object> {
        let mut key = pool.get();
        keys::write_object_key(&mut key, &id.object_type, &id.object_id);
        Ok(typed::get(txn, &buckets::objects(), &key)?)
    }

    pub fn try_get<T: ReadTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        object_type: &str,
        object_id: &str,
    ) -> Result<Option<Object>> {
        let mut key = pool.get();
        keys::write_object_key(&mut key, object_type, object_id);
        match typed::try_get(txn, &buckets::objects(), &key) {
            Ok(found) => Ok(found),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists<T: ReadTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        object_type: &str,
        object_id: &str,
    ) -> Result<bool> {
        let mut key = pool.get();
        keys::write_object_key(&mut key, object_type, object_id);
        Ok(typed::key_exists(txn, &buckets::objects(), &key)?)
    }

    /// Stamps and writes `incoming` unless its content is unchanged.
    pub fn set<T: WriteTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        incoming: Object,
        now: Timestamp,
    ) -> Result<SetOutcome<Object>> {
        let current = Self::try_get(txn, pool, &incoming.r#type, &incoming.id)?;
        let display = format!("{}:{}", incoming.r#type, incoming.id);
        let prepared = metadata::prepare(&display, incoming, current, now)?;
        if let Prepared::Write(obj) = &prepared {
            typed::set(txn, &buckets::objects(), &keys::key_of_object(obj), obj.clone())?;
        }
        Ok(prepared.into())
    }

    /// Deletes the object after checking `expected_etag`, optionally with
    /// every relation that references it.
    pub fn delete<T: WriteTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        id: &ObjectIdentifier,
        expected_etag: &str,
        with_relations: bool,
    ) -> Result<DeleteOutcome> {
        let current = Self::try_get(txn, pool, &id.object_type, &id.object_id)?;
        let display = format!("{}:{}", id.object_type, id.object_id);
        metadata::check_precondition(&display, expected_etag, current.as_ref())?;

        let mut outcome = DeleteOutcome { existed: current.is_some(), relations: 0 };
        if outcome.existed {
            let mut key = pool.get();
            keys::write_object_key(&mut key, &id.object_type, &id.object_id);
            typed::delete(txn, &buckets::objects(), &key)?;
        }
        if with_relations {
            outcome.relations =
                RelationStore::remove_endpoint(txn, pool, &id.object_type, &id.object_id)?;
        }
        Ok(outcome)
    }

    /// One page of objects, optionally restricted to one type.
    pub fn list<T: ReadTxn + ?Sized>(
        txn: &T,
        object_type: &str,
        options: &PageOptions,
        max_page_size: u32,
    ) -> Result<Page<Object>> {
        let prefix = keys::object_type_prefix(object_type);
        let objects = page::paginate(
            txn,
            &buckets::objects(),
            &prefix,
            options,
            max_page_size,
            |_, obj: Object| Ok(Some(obj)),
        )?;
        Ok(objects)
    }
}
