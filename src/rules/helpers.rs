//! Lenient readers for snapshot data.
//!
//! Query-protocol responses arrive from XML, so numbers and booleans may be
//! JSON strings. JSON-protocol responses carry real numbers and booleans.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::CacheEntry;

/// State of a slot as seen by a rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Never scheduled in this region.
    Missing,
    /// Holds an error, or no data.
    Failed(Option<&'a str>),
    Data(&'a Value),
}

pub fn lookup(entry: Option<&CacheEntry>) -> Lookup<'_> {
    match entry {
        None => Lookup::Missing,
        Some(entry) => match (entry.error(), entry.data()) {
            (None, Some(data)) => Lookup::Data(data),
            (error, _) => Lookup::Failed(error),
        },
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Truthiness of a flag; absent, null and anything unrecognised are `false`.
pub fn as_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

pub fn as_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Array member, treating a missing member as empty.
pub fn list<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value.get(field).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Whole days between an RFC 3339 timestamp and `now`.
pub fn days_ago(timestamp: &str, now: DateTime<Utc>) -> Option<i64> {
    let then = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some((now - then.with_timezone(&Utc)).num_days())
}
