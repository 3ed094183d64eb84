//! Field extractor: pull one named value out of a raw JSON tree via an
//! ordered list of candidate JSON-pointer paths. A path either fully resolves
//! or is abandoned for the next; the caller decides whether a total miss is
//! fatal for the record (`required_*`) or defaults to empty.

use serde_json::Value;

use super::SkipReason;

/// Value at the first pointer that resolves.
pub fn first<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| root.pointer(p))
}

pub fn text(root: &Value, paths: &[&str]) -> Option<String> {
    first(root, paths).and_then(Value::as_str).map(str::to_string)
}

pub fn count(root: &Value, paths: &[&str]) -> Option<i64> {
    first(root, paths).and_then(Value::as_i64)
}

/// Epoch seconds, tolerating numeric strings (`"0"`).
pub fn epoch(root: &Value, paths: &[&str]) -> Option<i64> {
    match first(root, paths)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Opaque identifier, delivered as either a JSON string or a bare integer.
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn required<'a>(
    root: &'a Value,
    field: &'static str,
    paths: &[&str],
) -> Result<&'a Value, SkipReason> {
    first(root, paths).ok_or(SkipReason::MissingField(field))
}

pub fn required_text(
    root: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<String, SkipReason> {
    required(root, field, paths)?
        .as_str()
        .map(str::to_string)
        .ok_or(SkipReason::MissingField(field))
}

pub fn required_id(
    root: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<String, SkipReason> {
    id_string(required(root, field, paths)?).ok_or(SkipReason::MissingField(field))
}

pub fn required_epoch(
    root: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<i64, SkipReason> {
    required(root, field, paths)?;
    epoch(root, paths).ok_or(SkipReason::BadTimestamp(field))
}
