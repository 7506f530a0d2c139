//! Etag computation.
//!
//! An etag is the 64-bit seahash of an entity's canonical protobuf encoding,
//! rendered as a decimal string. Server-stamped fields (`etag`, `created_at`,
//! `updated_at`) are cleared before hashing so that rewriting identical
//! content yields the same etag.

use prost::Message;

use crate::{Object, Relation};

/// Hashes arbitrary bytes into an etag string.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> String {
    seahash::hash(bytes).to_string()
}

/// Computes the content etag of an object.
pub fn object_etag(obj: &Object) -> String {
    let canonical = Object { etag: String::new(), created_at: None, updated_at: None, ..obj.clone() };
    hash_bytes(&canonical.encode_to_vec())
}

/// Computes the content etag of a relation.
pub fn relation_etag(rel: &Relation) -> String {
    let canonical =
        Relation { etag: String::new(), created_at: None, updated_at: None, ..rel.clone() };
    hash_bytes(&canonical.encode_to_vec())
}

/// Computes the etag of a manifest body.
#[inline]
pub fn body_etag(body: &[u8]) -> String {
    hash_bytes(body)
}
