//! Serialization capabilities for stored values.
//!
//! Directory messages use the protobuf binary encoding: field order is fixed
//! by tag number, maps are ordered, and unknown fields are skipped on decode.
//! Values that are not wire messages (the compiled model, stats) use JSON.

use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};

/// Error type for codec operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// Protobuf decoding failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying prost error.
        source: prost::DecodeError,
    },

    /// JSON encoding failed.
    #[snafu(display("JSON encoding failed: {source}"))]
    JsonEncode {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// JSON decoding failed.
    #[snafu(display("JSON decoding failed: {source}"))]
    JsonDecode {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },
}

/// A value that can be stored as bytes in a bucket.
pub trait Codec: Sized {
    /// Encodes the value into its canonical byte form.
    fn encode(&self) -> Vec<u8>;

    /// Decodes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are not a valid encoding.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

impl<M> Codec for M
where
    M: prost::Message + Default,
{
    fn encode(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        <M as prost::Message>::decode(bytes).context(DecodeSnafu)
    }
}

/// Encodes any serializable value as JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::JsonEncode` if serialization fails.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).context(JsonEncodeSnafu)
}

/// Decodes JSON bytes into a value.
///
/// # Errors
///
/// Returns `CodecError::JsonDecode` if the bytes are not valid JSON for `T`.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).context(JsonDecodeSnafu)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::collections::BTreeMap;

    use prost::Message;

    use super::*;
    use crate::{Object, Relation};

    #[test]
    fn test_object_encoding_is_deterministic() {
        let obj = Object {
            r#type: "user".to_string(),
            id: "alice".to_string(),
            display_name: "Alice".to_string(),
            properties: Some(crate::properties::from_json(serde_json::json!({
                "b": 1, "a": "x", "c": [true, null]
            }))),
            ..Default::default()
        };
        let first = Codec::encode(&obj);
        for _ in 0..10 {
            assert_eq!(Codec::encode(&obj.clone()), first);
        }
        let decoded = <Object as Codec>::decode(&first).expect("decode object");
        assert_eq!(decoded, obj);
    }

    #[test]
    fn test_decode_skips_unknown_fields() {
        // A relation with an extra field (tag 99) appended by a newer writer.
        let rel = Relation { object_type: "doc".to_string(), ..Default::default() };
        let mut bytes = rel.encode_to_vec();
        prost::encoding::string::encode(99, &"future".to_string(), &mut bytes);
        let decoded = <Relation as Codec>::decode(&bytes).expect("decode with unknown field");
        assert_eq!(decoded, rel);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = <Object as Codec>::decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn test_json_roundtrip_map() {
        let mut original = BTreeMap::new();
        original.insert("group".to_string(), 3u64);
        let bytes = encode_json(&original).expect("encode");
        let decoded: BTreeMap<String, u64> = decode_json(&bytes).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_json_decode_error() {
        let err = decode_json::<u64>(b"not json").unwrap_err();
        assert!(matches!(err, CodecError::JsonDecode { .. }));
    }
}
