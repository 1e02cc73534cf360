//! Driver row decoding.
//!
//! This module turns sqlx driver rows into engine-agnostic [`Row`]s.
//!
//! # Architecture
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Engine-specific decoders extract a typed [`SqlValue`] for that category
//!
//! A value that fails typed decoding falls back to its textual form, and then
//! to raw bytes, so an exotic column never fails the whole query.

use crate::models::{Engine, Row, SqlValue};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    UnsignedInteger,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Date,
    Time,
    DateTime,
    Timestamp,
    /// PostgreSQL array; the element type is categorized separately
    Array,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, engine: Engine) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.ends_with("[]") {
        return TypeCategory::Array;
    }

    // Temporal types - check before integers ("datetime" vs "int" overlaps are absent,
    // but "timestamp" must be split by engine)
    match lower.as_str() {
        "timestamptz" => return TypeCategory::Timestamp,
        "timestamp" if engine == Engine::MySql => return TypeCategory::Timestamp,
        "timestamp" | "datetime" => return TypeCategory::DateTime,
        "date" => return TypeCategory::Date,
        "time" => return TypeCategory::Time,
        _ => {}
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower == "year" {
        if lower.contains("unsigned") {
            return TypeCategory::UnsignedInteger;
        }
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" || lower == "bit" {
        return TypeCategory::Binary;
    }

    // Default to text for everything else (varchar, text, char, uuid, enum, etc.)
    TypeCategory::Text
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting driver rows into ordered [`Row`]s.
pub trait DecodeRow {
    fn decode_row(&self) -> Row;
}

impl DecodeRow for MySqlRow {
    fn decode_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Engine::MySql);
                (col.name().to_string(), mysql::decode_column(self, idx, category))
            })
            .collect()
    }
}

impl DecodeRow for PgRow {
    fn decode_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Engine::Postgres);
                (col.name().to_string(), postgres::decode_column(self, idx, category))
            })
            .collect()
    }
}

// =============================================================================
// Engine-Specific Decoders
// =============================================================================
//
// The two modules below are intentionally parallel. Each decoder returns None
// when the typed decode fails so the caller can fall back to text.

mod mysql {
    use super::*;
    use sqlx::MySql;

    fn get<T>(row: &MySqlRow, idx: usize) -> Option<T>
    where
        T: for<'r> sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
    {
        match row.try_get::<T, _>(idx) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(column = idx, error = %e, "Typed MySQL decode failed, falling back to text");
                None
            }
        }
    }

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> SqlValue {
        let is_null = row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true);
        if is_null {
            return SqlValue::Null;
        }

        let typed = match category {
            TypeCategory::Integer => get::<i64>(row, idx)
                .map(SqlValue::Int)
                .or_else(|| get::<u64>(row, idx).map(SqlValue::UInt)),
            TypeCategory::UnsignedInteger => get::<u64>(row, idx)
                .map(SqlValue::UInt)
                .or_else(|| get::<i64>(row, idx).map(SqlValue::Int)),
            TypeCategory::Float => get::<f64>(row, idx)
                .or_else(|| get::<f32>(row, idx).map(f64::from))
                .map(SqlValue::Float),
            TypeCategory::Decimal => get::<BigDecimal>(row, idx).map(SqlValue::Decimal),
            TypeCategory::Boolean => get::<bool>(row, idx).map(SqlValue::Bool),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(SqlValue::Bytes),
            TypeCategory::Json => get::<JsonValue>(row, idx).map(SqlValue::Json),
            TypeCategory::Date => get::<NaiveDate>(row, idx).map(SqlValue::Date),
            TypeCategory::Time => get::<NaiveTime>(row, idx).map(SqlValue::Time),
            TypeCategory::DateTime => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
            TypeCategory::Timestamp => get::<DateTime<Utc>>(row, idx).map(SqlValue::Timestamp),
            TypeCategory::Array | TypeCategory::Text => None,
        };

        typed.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> SqlValue {
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<String>, _>(idx) {
            return SqlValue::Text(v);
        }
        row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bytes)
            .unwrap_or(SqlValue::Null)
    }
}

mod postgres {
    use super::*;
    use sqlx::Postgres;

    fn get<T>(row: &PgRow, idx: usize) -> Option<T>
    where
        T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        match row.try_get::<T, _>(idx) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(column = idx, error = %e, "Typed PostgreSQL decode failed, falling back to text");
                None
            }
        }
    }

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> SqlValue {
        let is_null = row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true);
        if is_null {
            return SqlValue::Null;
        }

        let typed = match category {
            TypeCategory::Integer | TypeCategory::UnsignedInteger => get::<i64>(row, idx)
                .or_else(|| get::<i32>(row, idx).map(i64::from))
                .or_else(|| get::<i16>(row, idx).map(i64::from))
                .map(SqlValue::Int),
            TypeCategory::Float => get::<f64>(row, idx)
                .or_else(|| get::<f32>(row, idx).map(f64::from))
                .map(SqlValue::Float),
            TypeCategory::Decimal => get::<BigDecimal>(row, idx).map(SqlValue::Decimal),
            TypeCategory::Boolean => get::<bool>(row, idx).map(SqlValue::Bool),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(SqlValue::Bytes),
            TypeCategory::Json => get::<JsonValue>(row, idx).map(SqlValue::Json),
            TypeCategory::Date => get::<NaiveDate>(row, idx).map(SqlValue::Date),
            TypeCategory::Time => get::<NaiveTime>(row, idx).map(SqlValue::Time),
            TypeCategory::DateTime => get::<NaiveDateTime>(row, idx).map(SqlValue::DateTime),
            TypeCategory::Timestamp => get::<DateTime<Utc>>(row, idx).map(SqlValue::Timestamp),
            TypeCategory::Array => decode_array(row, idx),
            TypeCategory::Text => None,
        };

        typed.unwrap_or_else(|| decode_text(row, idx))
    }

    fn list<T: Into<SqlValue>>(items: Vec<Option<T>>) -> SqlValue {
        SqlValue::List(items.into_iter().map(SqlValue::from).collect())
    }

    /// One-dimensional arrays of scalar elements. Anything else is left to
    /// the text fallback (PostgreSQL array literal).
    fn decode_array(row: &PgRow, idx: usize) -> Option<SqlValue> {
        let type_name = row.columns()[idx].type_info().name().to_string();
        let element = type_name.trim_end_matches("[]");
        match categorize_type(element, Engine::Postgres) {
            TypeCategory::Integer | TypeCategory::UnsignedInteger => {
                get::<Vec<Option<i64>>>(row, idx)
                    .map(list)
                    .or_else(|| {
                        get::<Vec<Option<i32>>>(row, idx)
                            .map(|v| list(v.into_iter().map(|x| x.map(i64::from)).collect()))
                    })
                    .or_else(|| {
                        get::<Vec<Option<i16>>>(row, idx)
                            .map(|v| list(v.into_iter().map(|x| x.map(i64::from)).collect()))
                    })
            }
            TypeCategory::Float => get::<Vec<Option<f64>>>(row, idx).map(|v| {
                SqlValue::List(
                    v.into_iter()
                        .map(|x| x.map(SqlValue::Float).unwrap_or(SqlValue::Null))
                        .collect(),
                )
            }),
            TypeCategory::Boolean => get::<Vec<Option<bool>>>(row, idx).map(|v| {
                SqlValue::List(
                    v.into_iter()
                        .map(|x| x.map(SqlValue::Bool).unwrap_or(SqlValue::Null))
                        .collect(),
                )
            }),
            TypeCategory::Text => get::<Vec<Option<String>>>(row, idx).map(list),
            _ => None,
        }
    }

    fn decode_text(row: &PgRow, idx: usize) -> SqlValue {
        row.try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null)
    }
}
