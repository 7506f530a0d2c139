//! Typed access to bucket entries.
//!
//! Every function runs inside a caller-supplied transaction and never begins
//! or commits one, so multi-key writes stay atomic.

use reldir_types::{Codec, decode_json, encode_json};
use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;

use crate::{
    cursor::Cursor,
    error::{CodecSnafu, EncodeSnafu, Result, StoreError, display_key},
    path::Path,
    txn::{ReadTxn, WriteTxn},
};

fn decode_at<M: Codec>(path: &Path, key: &[u8], bytes: &[u8]) -> Result<M> {
    M::decode(bytes).context(CodecSnafu { path: path.table_name(), key: display_key(key) })
}

/// Reads and decodes one entry.
///
/// # Errors
///
/// Returns `KeyNotFound` if the key is absent, `PathNotFound` if the bucket
/// is absent, or `Codec` if the value does not decode.
pub fn get<M: Codec, T: ReadTxn + ?Sized>(txn: &T, path: &Path, key: &[u8]) -> Result<M> {
    match try_get(txn, path, key)? {
        Some(msg) => Ok(msg),
        None => Err(StoreError::KeyNotFound { path: path.table_name(), key: display_key(key) }),
    }
}

/// Like [`get`], but an absent key is `Ok(None)`.
///
/// # Errors
///
/// Returns `PathNotFound` if the bucket is absent, or `Codec` on decode failure.
pub fn try_get<M: Codec, T: ReadTxn + ?Sized>(
    txn: &T,
    path: &Path,
    key: &[u8],
) -> Result<Option<M>> {
    txn.get_raw(path, key)?.map(|bytes| decode_at(path, key, &bytes)).transpose()
}

/// Whether `key` exists. A missing bucket counts as absent.
///
/// # Errors
///
/// Returns storage errors only.
pub fn key_exists<T: ReadTxn + ?Sized>(txn: &T, path: &Path, key: &[u8]) -> Result<bool> {
    match txn.get_raw(path, key) {
        Ok(value) => Ok(value.is_some()),
        Err(StoreError::PathNotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Encodes and stores `msg`, overwriting any previous value. Returns `msg`.
///
/// # Errors
///
/// Returns storage errors from the write.
pub fn set<M: Codec, T: WriteTxn + ?Sized>(txn: &T, path: &Path, key: &[u8], msg: M) -> Result<M> {
    txn.put_raw(path, key, &msg.encode())?;
    Ok(msg)
}

/// Removes `key`. Absent keys and buckets are not errors.
///
/// # Errors
///
/// Returns storage errors from the delete.
pub fn delete<T: WriteTxn + ?Sized>(txn: &T, path: &Path, key: &[u8]) -> Result<()> {
    txn.delete_raw(path, key)?;
    Ok(())
}

/// Decodes every entry whose key starts with `prefix`, in key order.
///
/// # Errors
///
/// Returns `PathNotFound` if the bucket is absent, or `Codec` on decode failure.
pub fn scan<M: Codec, T: ReadTxn + ?Sized>(
    txn: &T,
    path: &Path,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, M)>> {
    let mut cursor = Cursor::new(txn, path, prefix)?;
    let mut out = Vec::new();
    while cursor.advance()? {
        if let (Some(key), Some(msg)) = (cursor.key(), cursor.decode::<M>()?) {
            out.push((key.to_vec(), msg));
        }
    }
    Ok(out)
}

/// Decodes every value in the bucket, in key order.
///
/// # Errors
///
/// Returns `PathNotFound` if the bucket is absent, or `Codec` on decode failure.
pub fn list<M: Codec, T: ReadTxn + ?Sized>(txn: &T, path: &Path) -> Result<Vec<M>> {
    Ok(scan(txn, path, &[])?.into_iter().map(|(_, msg)| msg).collect())
}

/// Reads a JSON-encoded value.
///
/// # Errors
///
/// Returns `KeyNotFound`/`PathNotFound` when absent, or `Codec` when the
/// JSON does not match `V`.
pub fn get_any<V: DeserializeOwned, T: ReadTxn + ?Sized>(
    txn: &T,
    path: &Path,
    key: &[u8],
) -> Result<V> {
    let bytes = txn
        .get_raw(path, key)?
        .ok_or_else(|| StoreError::KeyNotFound { path: path.table_name(), key: display_key(key) })?;
    decode_json(&bytes).context(CodecSnafu { path: path.table_name(), key: display_key(key) })
}

/// Stores `value` as JSON.
///
/// # Errors
///
/// Returns `Encode` if serialization fails, or storage errors from the write.
pub fn set_any<V: Serialize + ?Sized, T: WriteTxn + ?Sized>(
    txn: &T,
    path: &Path,
    key: &[u8],
    value: &V,
) -> Result<()> {
    let bytes = encode_json(value).context(EncodeSnafu { path: path.table_name() })?;
    txn.put_raw(path, key, &bytes)
}

/// Number of entries in the bucket; 0 when it does not exist.
///
/// # Errors
///
/// Returns storage errors only.
pub fn count<T: ReadTxn + ?Sized>(txn: &T, path: &Path) -> Result<u64> {
    txn.bucket_len(path)
}

/// Drops the bucket and every entry in it. Returns whether it existed.
///
/// # Errors
///
/// Returns storage errors only.
pub fn delete_bucket<T: WriteTxn + ?Sized>(txn: &T, path: &Path) -> Result<bool> {
    txn.delete_bucket(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeMap;

    use reldir_types::Object;

    use super::*;
    use crate::{Store, buckets, keys};

    fn user(id: &str) -> Object {
        Object { r#type: "user".into(), id: id.into(), display_name: id.to_uppercase(), ..Default::default() }
    }

    #[test]
    fn test_get_set_delete() {
        let store = Store::in_memory().expect("open");
        let objects = buckets::objects();
        let txn = store.write().expect("write");
        let key = keys::object_key("user", "alice");

        assert!(matches!(
            get::<Object, _>(&txn, &objects, &key),
            Err(StoreError::PathNotFound { .. })
        ));
        let stored = set(&txn, &objects, &key, user("alice")).expect("set");
        assert_eq!(get::<Object, _>(&txn, &objects, &key).expect("get"), stored);

        delete(&txn, &objects, &key).expect("delete");
        delete(&txn, &objects, &key).expect("second delete is a no-op");
        assert!(matches!(
            get::<Object, _>(&txn, &objects, &key),
            Err(StoreError::KeyNotFound { .. })
        ));
        assert!(try_get::<Object, _>(&txn, &objects, &key).expect("try_get").is_none());
        assert!(!key_exists(&txn, &buckets::relations_obj(), b"x").expect("exists"));
    }

    #[test]
    fn test_scan_prefix_in_key_order() {
        let store = Store::in_memory().expect("open");
        let objects = buckets::objects();
        store
            .update(|txn| -> Result<()> {
                for id in ["carol", "alice", "bob"] {
                    set(txn, &objects, &keys::object_key("user", id), user(id))?;
                }
                set(txn, &objects, &keys::object_key("group", "eng"), Object {
                    r#type: "group".into(),
                    id: "eng".into(),
                    ..Default::default()
                })?;
                Ok(())
            })
            .expect("seed");

        let txn = store.read().expect("read");
        let users: Vec<String> = scan::<Object, _>(&txn, &objects, &keys::object_type_prefix("user"))
            .expect("scan")
            .into_iter()
            .map(|(_, o)| o.id)
            .collect();
        assert_eq!(users, ["alice", "bob", "carol"]);
        assert_eq!(list::<Object, _>(&txn, &objects).expect("list").len(), 4);
        assert_eq!(count(&txn, &objects).expect("count"), 4);
    }

    #[test]
    fn test_any_values_use_json() {
        let store = Store::in_memory().expect("open");
        let path = buckets::manifest("default").expect("path");
        let txn = store.write().expect("write");
        let value: BTreeMap<String, u32> = [("a".to_string(), 1)].into();
        set_any(&txn, &path, b"model", &value).expect("set_any");
        assert_eq!(txn.get_raw(&path, b"model").expect("raw"), Some(br#"{"a":1}"#.to_vec()));
        let back: BTreeMap<String, u32> = get_any(&txn, &path, b"model").expect("get_any");
        assert_eq!(back, value);

        assert!(delete_bucket(&txn, &path).expect("drop"));
        assert!(!delete_bucket(&txn, &path).expect("drop again"));
    }

    #[test]
    fn test_corrupt_value_reports_key() {
        let store = Store::in_memory().expect("open");
        let txn = store.write().expect("write");
        txn.put_raw(&buckets::objects(), b"user\0x", &[0xff, 0xff, 0xff]).expect("put");
        let err = get::<Object, _>(&txn, &buckets::objects(), b"user\0x").unwrap_err();
        assert!(err.to_string().contains("user:x"), "{err}");
    }
}
