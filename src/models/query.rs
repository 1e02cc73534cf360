//! Query result model.
//!
//! [`QueryResult`] is the single payload shape returned by every SQL-running tool.
//! A successful result carries either the row set fields (`rows`, `row_count`)
//! or the mutation field (`affected_rows`), never both; a failed result carries
//! `error` plus whatever context is known.

use crate::error::DbError;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Normalized row as it appears on the wire.
pub type JsonRow = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryResult {
    /// True if the statement ran to completion
    pub success: bool,
    /// Executed SQL text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Rows produced by the statement (row-producing statements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<JsonRow>>,
    /// Number of rows returned (row-producing statements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Rows changed by the statement (mutation statements only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    /// Wall-clock execution time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Human-readable error message (failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category, e.g. "ConnectionError"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Hint for recovering from the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl QueryResult {
    fn blank(success: bool) -> Self {
        Self {
            success,
            query: None,
            rows: None,
            row_count: None,
            affected_rows: None,
            execution_time_ms: None,
            server_name: None,
            table_name: None,
            error: None,
            error_type: None,
            suggestion: None,
        }
    }

    /// Result of a row-producing statement.
    pub fn rows(
        server_name: impl Into<String>,
        query: impl Into<String>,
        rows: Vec<JsonRow>,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            query: Some(query.into()),
            row_count: Some(rows.len()),
            rows: Some(rows),
            execution_time_ms: Some(execution_time_ms),
            server_name: Some(server_name.into()),
            ..Self::blank(true)
        }
    }

    /// Result of a mutation statement.
    pub fn mutation(
        server_name: impl Into<String>,
        query: impl Into<String>,
        affected_rows: u64,
        execution_time_ms: f64,
    ) -> Self {
        Self {
            query: Some(query.into()),
            affected_rows: Some(affected_rows),
            execution_time_ms: Some(execution_time_ms),
            server_name: Some(server_name.into()),
            ..Self::blank(true)
        }
    }

    /// Failure-shaped result for an error caught at the tool boundary.
    pub fn failure(err: &DbError) -> Self {
        Self {
            error: Some(err.to_string()),
            error_type: Some(err.kind().to_string()),
            suggestion: err.suggestion().map(String::from),
            ..Self::blank(false)
        }
    }

    /// Attach the server name when it is known and not already set.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        let server_name = server_name.into();
        if self.server_name.is_none() && !server_name.is_empty() {
            self.server_name = Some(server_name);
        }
        self
    }

    /// Attach the query text when it is known and not already set.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        if self.query.is_none() && !query.is_empty() {
            self.query = Some(query);
        }
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        if !table_name.is_empty() {
            self.table_name = Some(table_name);
        }
        self
    }

    /// True if this result is the row-producing shape.
    pub fn is_row_set(&self) -> bool {
        self.success && self.rows.is_some()
    }

    /// True if this result is the mutation shape.
    pub fn is_mutation(&self) -> bool {
        self.success && self.affected_rows.is_some()
    }
}
