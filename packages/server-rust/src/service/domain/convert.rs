//! `Value` <-> `rmpv::Value` conversion shared by every domain service that
//! crosses the wire boundary (CRDT, query, search, persistence). CRDT maps
//! store the typed `Value` enum internally so the query registry and policy
//! field filter can inspect entries without deserializing; the wire format
//! carries `rmpv::Value` so clients don't need the server's type definitions.

use latticedb_core::types::Value;

/// Converts a stored `Value` into the untyped `rmpv::Value` wire format.
#[must_use]
pub fn value_to_rmpv(value: &Value) -> rmpv::Value {
    match value {
        Value::Null => rmpv::Value::Nil,
        Value::Bool(b) => rmpv::Value::Boolean(*b),
        Value::Int(i) => rmpv::Value::Integer((*i).into()),
        Value::Float(f) => rmpv::Value::F64(*f),
        Value::String(s) => rmpv::Value::String(s.clone().into()),
        Value::Bytes(b) => rmpv::Value::Binary(b.clone()),
        Value::Array(items) => rmpv::Value::Array(items.iter().map(value_to_rmpv).collect()),
        Value::Map(map) => rmpv::Value::Map(
            map.iter()
                .map(|(k, v)| (rmpv::Value::String(k.clone().into()), value_to_rmpv(v)))
                .collect(),
        ),
    }
}

/// Converts an incoming `rmpv::Value` into the server's stored `Value`.
/// Map keys that aren't strings are skipped (the CRDT `Value::Map` variant
/// is string-keyed, matching JSON-object semantics).
#[must_use]
pub fn rmpv_to_value(value: &rmpv::Value) -> Value {
    match value {
        rmpv::Value::Nil => Value::Null,
        rmpv::Value::Boolean(b) => Value::Bool(*b),
        rmpv::Value::Integer(i) => i.as_i64().map(Value::Int).unwrap_or(Value::Null),
        rmpv::Value::F32(f) => Value::Float(f64::from(*f)),
        rmpv::Value::F64(f) => Value::Float(*f),
        rmpv::Value::String(s) => Value::String(s.as_str().unwrap_or_default().to_string()),
        rmpv::Value::Binary(b) => Value::Bytes(b.clone()),
        rmpv::Value::Array(items) => Value::Array(items.iter().map(rmpv_to_value).collect()),
        rmpv::Value::Map(entries) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in entries {
                if let Some(key) = k.as_str() {
                    map.insert(key.to_string(), rmpv_to_value(v));
                }
            }
            Value::Map(map)
        }
        rmpv::Value::Ext(_, bytes) => Value::Bytes(bytes.clone()),
    }
}
