use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generic runtime value type carried by CRDT map entries.
///
/// This is the `V` that flows through `LWWRecord<V>`/`ORRecord<V>` inside
/// `lww_map`/`or_map`. At the wire boundary it round-trips through
/// `rmpv::Value` (see `messages::base`); internally, keeping a typed enum
/// rather than raw bytes lets the query registry and policy field filter
/// inspect and project values without re-deserializing on every access.
///
/// `Map` uses a `BTreeMap` (not `HashMap`) so that two `Value`s built from
/// the same logical data always serialize identically -- required for the
/// `MerkleTree` entry hash to be order-independent of map-construction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value distinct from an unset field.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed 64-bit integer scalar.
    Int(i64),
    /// 64-bit floating point scalar.
    Float(f64),
    /// UTF-8 string scalar.
    String(String),
    /// Opaque byte string.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Ordered (by key) map of values, for nested object values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the field at `path` (dot-separated) for field-level
    /// projection, or `None` if any segment is missing or not a `Map`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Map(m) => current = m.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Discriminant for CRDT map types (LWW vs OR), detected at load time from
/// the persisted record shape rather than any runtime type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapType {
    /// Last-Write-Wins Map: conflict resolution by highest timestamp.
    Lww,
    /// Observed-Remove Map: supports concurrent additions with unique tags.
    Or,
}

/// Authentication principal for multi-tenancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Roles assigned to this principal for authorization checks.
    pub roles: Vec<String>,
}
