//! JSON merge patch (RFC 7386) creation
//!
//! Only fields that differ from the base are emitted. Fields removed from the
//! base are sent as `null`. Arrays are compared whole and replaced whole.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Merge patch turning `base` into `current`, or `None` if they are equal
pub fn diff(base: &Value, current: &Value) -> Option<Value> {
    match (base, current) {
        (Value::Object(base), Value::Object(current)) => {
            let mut patch = Map::new();
            for (key, value) in current {
                match base.get(key) {
                    Some(old) => {
                        if let Some(changed) = diff(old, value) {
                            patch.insert(key.clone(), changed);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in base.keys() {
                if !current.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            if patch.is_empty() {
                None
            } else {
                Some(Value::Object(patch))
            }
        }
        (base, current) if base == current => None,
        (_, current) => Some(current.clone()),
    }
}

/// Merge patch between two typed objects
pub fn merge_from<K: Serialize>(base: &K, current: &K) -> Result<Option<Value>> {
    let base = serde_json::to_value(base)?;
    let current = serde_json::to_value(current)?;
    Ok(diff(&base, &current))
}

/// Restrict a merge patch to a single top-level field
pub fn only_field(patch: Option<Value>, field: &str) -> Option<Value> {
    let value = patch?.get(field)?.clone();
    let mut restricted = Map::new();
    restricted.insert(field.to_string(), value);
    Some(Value::Object(restricted))
}
