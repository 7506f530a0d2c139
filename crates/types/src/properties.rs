//! Conversions between JSON values and protobuf `Struct` properties.
//!
//! Object properties and export stats travel as `google.protobuf.Struct`.
//! Struct fields are a `BTreeMap`, so encodings are stable across runs.

use prost_types::{ListValue, Struct, Value, value::Kind};
use serde_json::{Map, Number};

/// Converts a JSON value into a `Struct`.
///
/// Non-object values are wrapped under a single `"value"` field.
pub fn from_json(value: serde_json::Value) -> Struct {
    match value {
        serde_json::Value::Object(map) => {
            Struct { fields: map.into_iter().map(|(k, v)| (k, to_value(v))).collect() }
        },
        other => {
            let mut fields = std::collections::BTreeMap::new();
            fields.insert("value".to_string(), to_value(other));
            Struct { fields }
        },
    }
}

/// Converts a `Struct` into a JSON object.
pub fn to_json(value: &Struct) -> serde_json::Value {
    serde_json::Value::Object(
        value.fields.iter().map(|(k, v)| (k.clone(), from_value(v))).collect::<Map<_, _>>(),
    )
}

fn to_value(value: serde_json::Value) -> Value {
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(items) => {
            Kind::ListValue(ListValue { values: items.into_iter().map(to_value).collect() })
        },
        serde_json::Value::Object(map) => Kind::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, to_value(v))).collect(),
        }),
    };
    Value { kind: Some(kind) }
}

fn from_value(value: &Value) -> serde_json::Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::NumberValue(n)) => {
            Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number)
        },
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(from_value).collect())
        },
        Some(Kind::StructValue(s)) => to_json(s),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_nested_roundtrip() {
        let original = json!({
            "email": "alice@example.com",
            "age": 42.0,
            "tags": ["a", "b"],
            "address": {"city": "Oslo", "zip": null},
            "active": true
        });
        assert_eq!(to_json(&from_json(original.clone())), original);
    }

    #[test]
    fn test_scalar_is_wrapped() {
        let s = from_json(json!("plain"));
        assert_eq!(to_json(&s), json!({"value": "plain"}));
    }
}
