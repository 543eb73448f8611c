//! Submitted parameter trees.
//!
//! A submission is a string-keyed JSON object. Nested relations travel under
//! `<relation>_attributes`; list relations hold an object keyed by ordinal
//! strings (`"0"`, `"1"`, ...) which identify entries within one request.

use serde_json::Value as JsonValue;

/// One level of a submitted parameter tree (submission order preserved).
pub type ParamMap = serde_json::Map<String, JsonValue>;

pub const ATTRIBUTES_SUFFIX: &str = "_attributes";

/// Implicit key that marks a nested node for destruction.
pub const DESTROY_KEY: &str = "_destroy";

/// Key that is echoed back by forms but never assignable.
pub const ID_KEY: &str = "id";

/// Wire key carrying the nested attributes of `relation`.
///
/// Shared by whoever encodes submissions and by the binder that decodes them.
pub fn attributes_key(relation: &str) -> String {
    format!("{relation}{ATTRIBUTES_SUFFIX}")
}

/// Inverse of [`attributes_key`].
pub fn relation_of(key: &str) -> Option<&str> {
    key.strip_suffix(ATTRIBUTES_SUFFIX).filter(|name| !name.is_empty())
}

/// Ordinal position encoded by a list key, if it is a plain index.
pub fn ordinal_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Entries of an index-keyed map in ordinal order.
///
/// Numeric keys come first in ascending order; any other keys follow in
/// submission order.
pub fn in_ordinal_order(map: &ParamMap) -> Vec<(&str, &JsonValue)> {
    let mut numeric: Vec<(usize, &str, &JsonValue)> = Vec::new();
    let mut other: Vec<(&str, &JsonValue)> = Vec::new();
    for (key, value) in map {
        match ordinal_index(key) {
            Some(idx) => numeric.push((idx, key.as_str(), value)),
            None => other.push((key.as_str(), value)),
        }
    }
    numeric.sort_by_key(|(idx, _, _)| *idx);
    numeric
        .into_iter()
        .map(|(_, key, value)| (key, value))
        .chain(other)
        .collect()
}

/// Entries of a list submission, accepting JSON arrays as index maps.
pub fn list_entries(raw: &JsonValue) -> Option<Vec<(String, &JsonValue)>> {
    match raw {
        JsonValue::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(idx, v)| (idx.to_string(), v))
                .collect(),
        ),
        _ => None,
    }
}

/// Form-style truthiness for checkbox-like values (`_destroy`).
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_i64() == Some(1),
        JsonValue::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "t" | "yes" | "on"
        ),
        _ => false,
    }
}
