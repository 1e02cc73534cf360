//! Value normalization.
//!
//! Converts decoded [`SqlValue`]s into JSON values that survive a textual
//! transport:
//! - dates and timestamps become ISO-8601 strings
//! - decimals become doubles (precision loss accepted)
//! - bytes become UTF-8 text when valid, lowercase hex otherwise
//!
//! Lists and nested rows are walked recursively with their order preserved.
//! Nothing here knows which engine produced the value.

use crate::models::{JsonRow, Row, SqlValue};
use bigdecimal::ToPrimitive;
use serde_json::Value as JsonValue;

/// Normalize every row of a result set.
pub fn normalize_rows(rows: &[Row]) -> Vec<JsonRow> {
    rows.iter().map(normalize_row).collect()
}

/// Normalize a single row into an ordered JSON object.
pub fn normalize_row(row: &Row) -> JsonRow {
    row.iter()
        .map(|(name, value)| (name.to_string(), normalize_value(value)))
        .collect()
}

/// Normalize one value.
pub fn normalize_value(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(v) => JsonValue::Bool(*v),
        SqlValue::Int(v) => JsonValue::Number((*v).into()),
        SqlValue::UInt(v) => JsonValue::Number((*v).into()),
        SqlValue::Float(v) => float_value(*v),
        SqlValue::Decimal(d) => match d.to_f64() {
            Some(f) => float_value(f),
            None => JsonValue::String(d.to_string()),
        },
        SqlValue::Text(s) => JsonValue::String(s.clone()),
        SqlValue::Bytes(bytes) => bytes_value(bytes),
        SqlValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
        SqlValue::DateTime(dt) => {
            JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        SqlValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        SqlValue::Json(v) => v.clone(),
        SqlValue::List(items) => JsonValue::Array(items.iter().map(normalize_value).collect()),
        SqlValue::Map(row) => JsonValue::Object(normalize_row(row)),
    }
}

/// NaN and infinities have no JSON number form; keep them as text.
fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn bytes_value(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(hex::encode(bytes)),
    }
}
