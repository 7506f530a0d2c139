//! Relation storage with dual indexing.
//!
//! Every relation is stored under an object-primary key in `relations_obj`
//! and a subject-primary key in `relations_sub`. [`RelationStore::write`] and
//! [`RelationStore::remove`] are the only functions that touch the index
//! buckets, and they always update both copies in the caller's transaction.

use prost_types::Timestamp;
use reldir_store::{
    Direction, KeyBufferPool, Page, PageOptions, ReadTxn, StoreError, WriteTxn, display_key,
    keys::{self, RelationTuple},
    page, typed,
};
use reldir_types::{Codec, Relation, RelationFilter, RelationIdentifier, relation_identifier};

use crate::{
    error::{DirectoryError, Result},
    metadata::{self, Prepared, SetOutcome},
};

/// Relation storage operations.
pub(crate) struct RelationStore;

impl RelationStore {
    /// Writes `rel` to both indexes.
    pub fn write<T: WriteTxn + ?Sized>(txn: &T, pool: &KeyBufferPool, rel: &Relation) -> Result<()> {
        let value = rel.encode();
        for direction in Direction::BOTH {
            let mut key = pool.get();
            keys::write_relation_key(&mut key, direction, rel);
            txn.put_raw(&direction.bucket(), &key, &value)?;
        }
        Ok(())
    }

    /// Removes the tuple from both indexes. Returns whether the
    /// object-primary copy existed.
    pub fn remove<T, R>(txn: &T, pool: &KeyBufferPool, rel: &R) -> Result<bool>
    where
        T: WriteTxn + ?Sized,
        R: RelationTuple + ?Sized,
    {
        let mut existed = false;
        for direction in Direction::BOTH {
            let mut key = pool.get();
            keys::write_relation_key(&mut key, direction, rel);
            let removed = txn.delete_raw(&direction.bucket(), &key)?;
            if direction == Direction::ObjectToSubject {
                existed = removed;
            }
        }
        Ok(existed)
    }

    /// Reads the relation stored under exactly this tuple.
    pub fn try_get<T, R>(txn: &T, pool: &KeyBufferPool, rel: &R) -> Result<Option<Relation>>
    where
        T: ReadTxn + ?Sized,
        R: RelationTuple + ?Sized,
    {
        let direction = Direction::ObjectToSubject;
        let mut key = pool.get();
        keys::write_relation_key(&mut key, direction, rel);
        match typed::try_get(txn, &direction.bucket(), &key) {
            Ok(found) => Ok(found),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up the single relation matching `id`.
    ///
    /// An empty `subject_relation` in `id` matches any subject relation, so
    /// a direct and an indirect tuple for the same endpoints both match.
    pub fn find<T: ReadTxn + ?Sized>(txn: &T, id: &RelationIdentifier) -> Result<Relation> {
        let filter = RelationFilter::from(id);
        let direction = Direction::ObjectToSubject;
        let prefix = keys::relation_prefix(direction, &filter);
        let mut found: Vec<Relation> = typed::scan::<Relation, _>(txn, &direction.bucket(), &prefix)?
            .into_iter()
            .map(|(_, rel)| rel)
            .filter(|rel| filter.matches(rel))
            .collect();
        match found.len() {
            0 => Err(StoreError::KeyNotFound {
                path: direction.bucket().table_name(),
                key: display_key(&keys::relation_key(direction, id)),
            }
            .into()),
            1 => Ok(found.remove(0)),
            count => Err(DirectoryError::MultipleResults { key: display_relation(id), count }),
        }
    }

    /// Stamps and writes `incoming` unless its content is unchanged.
    pub fn set<T: WriteTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        incoming: Relation,
        now: Timestamp,
    ) -> Result<SetOutcome<Relation>> {
        let current = Self::try_get(txn, pool, &incoming)?;
        let key = display_relation(&incoming);
        let prepared = metadata::prepare(&key, incoming, current, now)?;
        if let Prepared::Write(rel) = &prepared {
            Self::write(txn, pool, rel)?;
        }
        Ok(prepared.into())
    }

    /// Deletes the tuple after checking `expected_etag`. Returns whether it
    /// existed.
    pub fn delete<T: WriteTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        id: &RelationIdentifier,
        expected_etag: &str,
    ) -> Result<bool> {
        if !expected_etag.is_empty() {
            let current = Self::try_get(txn, pool, id)?;
            metadata::check_precondition(&display_relation(id), expected_etag, current.as_ref())?;
        }
        Self::remove(txn, pool, id)
    }

    /// One page of relations matching `filter`, read from the index its
    /// specificity selects.
    pub fn query<T: ReadTxn + ?Sized>(
        txn: &T,
        filter: &RelationFilter,
        options: &PageOptions,
        max_page_size: u32,
    ) -> Result<Page<Relation>> {
        let direction = Direction::for_filter(filter);
        let prefix = keys::relation_prefix(direction, filter);
        let selected = page::paginate(
            txn,
            &direction.bucket(),
            &prefix,
            options,
            max_page_size,
            |_, rel: Relation| Ok(filter.matches(&rel).then_some(rel)),
        )?;
        Ok(selected)
    }

    /// Deletes every relation with the object at either end. Returns the
    /// number of tuples removed.
    pub fn remove_endpoint<T: WriteTxn + ?Sized>(
        txn: &T,
        pool: &KeyBufferPool,
        object_type: &str,
        object_id: &str,
    ) -> Result<u64> {
        let prefix = keys::endpoint_prefix(object_type, object_id);
        let mut removed = 0;
        for direction in Direction::BOTH {
            let bucket = direction.bucket();
            if !txn.bucket_exists(&bucket)? {
                continue;
            }
            for (_, rel) in typed::scan::<Relation, _>(txn, &bucket, &prefix)? {
                if Self::remove(txn, pool, &rel)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// `ot:oid#rel@st:sid[#srel]` for errors and logs.
pub(crate) fn display_relation<R: RelationTuple + ?Sized>(rel: &R) -> String {
    let t = rel.tuple();
    let mut out = format!(
        "{}:{}#{}@{}:{}",
        t.object_type, t.object_id, t.relation, t.subject_type, t.subject_id
    );
    if !t.subject_relation.is_empty() {
        out.push('#');
        out.push_str(t.subject_relation);
    }
    out
}

/// Identifier of a stored relation.
pub(crate) fn identifier(rel: &Relation) -> RelationIdentifier {
    relation_identifier(rel)
}
