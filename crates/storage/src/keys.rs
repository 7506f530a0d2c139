//! Key encoding for objects and relations.
//!
//! Object key: `{type}\0{id}`.
//!
//! Relations are stored twice, once per [`Direction`]:
//! - object-primary: `{obj_type}\0{obj_id}\x1f{relation}\x1f{sub_type}\0{sub_id}[\x1f{sub_relation}]`
//! - subject-primary: `{sub_type}\0{sub_id}\x1f{relation}\x1f{obj_type}\0{obj_id}[\x1f{sub_relation}]`
//!
//! Identifiers never contain either separator byte (enforced by
//! `reldir_types::validation`), so both orderings are prefix-scannable from
//! their leading endpoint.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use reldir_types::{
    Object, ObjectIdentifier, Relation, RelationFilter, RelationIdentifier,
    validation::{FIELD_SEPARATOR, TYPE_ID_SEPARATOR},
};

use crate::{
    error::{Result, StoreError, display_key},
    path::{Path, buckets},
};

/// Which relation index a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Object-primary index (`relations_obj`).
    ObjectToSubject,
    /// Subject-primary index (`relations_sub`).
    SubjectToObject,
}

impl Direction {
    /// Both directions, object-primary first.
    pub const BOTH: [Direction; 2] = [Direction::ObjectToSubject, Direction::SubjectToObject];

    /// Bucket holding this index.
    pub fn bucket(self) -> Path {
        match self {
            Self::ObjectToSubject => buckets::relations_obj(),
            Self::SubjectToObject => buckets::relations_sub(),
        }
    }

    /// Picks the index for a relation query.
    ///
    /// A fully specified object selects the object-primary index; otherwise a
    /// fully specified subject selects the subject-primary index. Anything
    /// less falls back to the object-primary index, where the prefix covers
    /// whatever leading fields are set and the caller filters the rest.
    pub fn for_filter(filter: &RelationFilter) -> Self {
        if !filter.object_specified() && filter.subject_specified() {
            Self::SubjectToObject
        } else {
            Self::ObjectToSubject
        }
    }
}

/// Borrowed view of the six relation tuple fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuple<'a> {
    pub object_type: &'a str,
    pub object_id: &'a str,
    pub relation: &'a str,
    pub subject_type: &'a str,
    pub subject_id: &'a str,
    pub subject_relation: &'a str,
}

/// Anything carrying a relation tuple.
pub trait RelationTuple {
    /// Borrows the tuple fields.
    fn tuple(&self) -> Tuple<'_>;
}

macro_rules! impl_relation_tuple {
    ($($ty:ty),*) => {$(
        impl RelationTuple for $ty {
            fn tuple(&self) -> Tuple<'_> {
                Tuple {
                    object_type: &self.object_type,
                    object_id: &self.object_id,
                    relation: &self.relation,
                    subject_type: &self.subject_type,
                    subject_id: &self.subject_id,
                    subject_relation: &self.subject_relation,
                }
            }
        }
    )*};
}

impl_relation_tuple!(Relation, RelationIdentifier, RelationFilter);

/// Appends `{type}\0{id}` to `buf`.
pub fn write_object_key(buf: &mut Vec<u8>, object_type: &str, object_id: &str) {
    buf.extend_from_slice(object_type.as_bytes());
    buf.push(TYPE_ID_SEPARATOR);
    buf.extend_from_slice(object_id.as_bytes());
}

/// Encodes an object key.
pub fn object_key(object_type: &str, object_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(object_type.len() + object_id.len() + 1);
    write_object_key(&mut buf, object_type, object_id);
    buf
}

/// Key of an object message.
pub fn key_of_object(object: &Object) -> Vec<u8> {
    object_key(&object.r#type, &object.id)
}

/// Prefix matching every object of `object_type`; empty matches all objects.
pub fn object_type_prefix(object_type: &str) -> Vec<u8> {
    if object_type.is_empty() {
        return Vec::new();
    }
    let mut buf = Vec::with_capacity(object_type.len() + 1);
    buf.extend_from_slice(object_type.as_bytes());
    buf.push(TYPE_ID_SEPARATOR);
    buf
}

/// Prefix matching every relation key, in either index, whose leading
/// endpoint is `{type}\0{id}`.
pub fn endpoint_prefix(endpoint_type: &str, endpoint_id: &str) -> Vec<u8> {
    let mut buf = object_key(endpoint_type, endpoint_id);
    buf.push(FIELD_SEPARATOR);
    buf
}

/// Appends the relation key for `direction` to `buf`.
pub fn write_relation_key<R: RelationTuple + ?Sized>(
    buf: &mut Vec<u8>,
    direction: Direction,
    rel: &R,
) {
    let t = rel.tuple();
    let (lead_type, lead_id, tail_type, tail_id) = match direction {
        Direction::ObjectToSubject => (t.object_type, t.object_id, t.subject_type, t.subject_id),
        Direction::SubjectToObject => (t.subject_type, t.subject_id, t.object_type, t.object_id),
    };
    write_object_key(buf, lead_type, lead_id);
    buf.push(FIELD_SEPARATOR);
    buf.extend_from_slice(t.relation.as_bytes());
    buf.push(FIELD_SEPARATOR);
    write_object_key(buf, tail_type, tail_id);
    if !t.subject_relation.is_empty() {
        buf.push(FIELD_SEPARATOR);
        buf.extend_from_slice(t.subject_relation.as_bytes());
    }
}

/// Encodes a relation key for `direction`.
pub fn relation_key<R: RelationTuple + ?Sized>(direction: Direction, rel: &R) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    write_relation_key(&mut buf, direction, rel);
    buf
}

/// Longest key prefix implied by `filter` in `direction`.
///
/// Fields are appended in key order up to the first unspecified one. Later
/// fields, even when set, are left to [`RelationFilter::matches`].
pub fn relation_prefix(direction: Direction, filter: &RelationFilter) -> Vec<u8> {
    let t = filter.tuple();
    let (lead_type, lead_id, tail_type, tail_id) = match direction {
        Direction::ObjectToSubject => (t.object_type, t.object_id, t.subject_type, t.subject_id),
        Direction::SubjectToObject => (t.subject_type, t.subject_id, t.object_type, t.object_id),
    };

    let mut buf = Vec::with_capacity(64);
    if lead_type.is_empty() {
        return buf;
    }
    buf.extend_from_slice(lead_type.as_bytes());
    buf.push(TYPE_ID_SEPARATOR);
    if lead_id.is_empty() {
        return buf;
    }
    buf.extend_from_slice(lead_id.as_bytes());
    buf.push(FIELD_SEPARATOR);
    if t.relation.is_empty() {
        return buf;
    }
    buf.extend_from_slice(t.relation.as_bytes());
    buf.push(FIELD_SEPARATOR);
    if tail_type.is_empty() {
        return buf;
    }
    buf.extend_from_slice(tail_type.as_bytes());
    buf.push(TYPE_ID_SEPARATOR);
    if tail_id.is_empty() {
        return buf;
    }
    // No trailing separator: the id may be followed by the end of the key or
    // by a subject relation.
    buf.extend_from_slice(tail_id.as_bytes());
    if !t.subject_relation.is_empty() {
        buf.push(FIELD_SEPARATOR);
        buf.extend_from_slice(t.subject_relation.as_bytes());
    }
    buf
}

fn invalid(key: &[u8], message: &str) -> StoreError {
    StoreError::InvalidKey { key: display_key(key), message: message.to_string() }
}

fn utf8(key: &[u8], part: &[u8]) -> Result<String> {
    String::from_utf8(part.to_vec()).map_err(|_| invalid(key, "segment is not valid UTF-8"))
}

fn split_endpoint<'k>(key: &[u8], part: &'k [u8]) -> Result<(&'k [u8], &'k [u8])> {
    let mut halves = part.splitn(2, |b| *b == TYPE_ID_SEPARATOR);
    match (halves.next(), halves.next()) {
        (Some(t), Some(id)) if !t.is_empty() && !id.is_empty() && !id.contains(&TYPE_ID_SEPARATOR) => {
            Ok((t, id))
        },
        _ => Err(invalid(key, "expected {type}\\0{id}")),
    }
}

/// Decodes an object key.
///
/// # Errors
///
/// Returns `InvalidKey` if the key is not `{type}\0{id}` with both parts
/// non-empty.
pub fn parse_object_key(key: &[u8]) -> Result<ObjectIdentifier> {
    if key.contains(&FIELD_SEPARATOR) {
        return Err(invalid(key, "object key contains a field separator"));
    }
    let (object_type, object_id) = split_endpoint(key, key)?;
    Ok(ObjectIdentifier { object_type: utf8(key, object_type)?, object_id: utf8(key, object_id)? })
}

/// Decodes a relation key from the index named by `direction`.
///
/// # Errors
///
/// Returns `InvalidKey` if separators are missing or misplaced.
pub fn parse_relation_key(direction: Direction, key: &[u8]) -> Result<RelationIdentifier> {
    let fields: Vec<&[u8]> = key.split(|b| *b == FIELD_SEPARATOR).collect();
    let (lead, relation, tail, subject_relation) = match fields.as_slice() {
        [lead, relation, tail] => (*lead, *relation, *tail, &b""[..]),
        [lead, relation, tail, sub_rel] if !sub_rel.is_empty() => (*lead, *relation, *tail, *sub_rel),
        _ => return Err(invalid(key, "expected 3 or 4 fields")),
    };
    if relation.is_empty() || relation.contains(&TYPE_ID_SEPARATOR) {
        return Err(invalid(key, "relation field is empty or malformed"));
    }
    if subject_relation.contains(&TYPE_ID_SEPARATOR) {
        return Err(invalid(key, "subject relation contains a type separator"));
    }
    let (lead_type, lead_id) = split_endpoint(key, lead)?;
    let (tail_type, tail_id) = split_endpoint(key, tail)?;
    let ((ot, oid), (st, sid)) = match direction {
        Direction::ObjectToSubject => ((lead_type, lead_id), (tail_type, tail_id)),
        Direction::SubjectToObject => ((tail_type, tail_id), (lead_type, lead_id)),
    };
    Ok(RelationIdentifier {
        object_type: utf8(key, ot)?,
        object_id: utf8(key, oid)?,
        relation: utf8(key, relation)?,
        subject_type: utf8(key, st)?,
        subject_id: utf8(key, sid)?,
        subject_relation: utf8(key, subject_relation)?,
    })
}

/// Default number of idle buffers a pool retains.
pub const DEFAULT_POOL_BUFFERS: usize = 64;

/// Buffers that grew past this are dropped instead of returned.
const MAX_RETAINED_CAPACITY: usize = 4096;

/// Free list of scratch buffers for key encoding.
#[derive(Debug)]
pub struct KeyBufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_buffers: usize,
}

impl KeyBufferPool {
    /// Creates a pool that retains at most `max_buffers` idle buffers.
    pub fn new(max_buffers: usize) -> Self {
        Self { free: Mutex::new(Vec::with_capacity(max_buffers)), max_buffers }
    }

    /// Takes an empty buffer, allocating when the free list is empty.
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self.free.lock().pop().unwrap_or_else(|| Vec::with_capacity(128));
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_buffers {
            free.push(buf);
        }
    }
}

impl Default for KeyBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_BUFFERS)
    }
}

/// Scratch buffer returned to its pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'p> {
    buf: Vec<u8>,
    pool: &'p KeyBufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}
