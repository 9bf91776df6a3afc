//! Presence checks over open JSON field maps.

use serde_json::{Map, Value};

/// Blank values: null, empty or whitespace-only strings, empty arrays and
/// objects, `false`, and numeric zero.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(true, |v| v == 0.0),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Field exists and is not blank.
pub fn has_value(data: &Map<String, Value>, field: &str) -> bool {
    data.get(field).is_some_and(|v| !is_blank(v))
}

/// Field exists and is not JSON null.
pub fn is_set(data: &Map<String, Value>, field: &str) -> bool {
    data.get(field).is_some_and(|v| !v.is_null())
}

/// Non-blank string value of a field.
pub fn str_field<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
