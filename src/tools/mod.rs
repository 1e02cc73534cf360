//! MCP tool implementations.
//!
//! This module contains all tool handlers:
//! - `servers`: List configured servers
//! - `query`: Execute arbitrary SQL
//! - `schema`: Table list and table schema lookups
//! - `admin`: MySQL-only administrative commands
//!
//! Handlers never return errors to the protocol layer; every failure is folded
//! into a failure-shaped [`QueryResult`](crate::models::QueryResult).

pub mod admin;
pub mod query;
pub mod schema;
pub mod servers;

pub use admin::{
    AdminToolHandler, ProcessListInput, StatusInput, TableMaintenanceInput, VariablesInput,
};
pub use query::{ExecuteSqlInput, QueryToolHandler};
pub use schema::{SchemaToolHandler, TableListInput, TableSchemaInput};
pub use servers::{ListServersOutput, ServerToolHandler};

use crate::error::{DbError, DbResult};

/// Return the trimmed-nonempty value of a required string argument.
pub(crate) fn required(value: Option<&str>, parameter: &str) -> DbResult<String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(v.to_string()),
        None => Err(DbError::missing_parameter(parameter)),
    }
}
