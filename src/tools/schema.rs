//! Schema introspection tools.
//!
//! This module implements the `get_table_list` and `get_table_schema` MCP tools.

use crate::db::Registry;
use crate::models::QueryResult;
use crate::tools::required;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Input for the get_table_list tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TableListInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Input for the get_table_schema tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TableSchemaInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// Table to describe, e.g. "users"
    #[serde(default)]
    pub table_name: Option<String>,
}

/// Handler for schema introspection.
pub struct SchemaToolHandler {
    registry: Arc<Registry>,
}

impl SchemaToolHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Handle the get_table_list tool call.
    pub async fn get_table_list(&self, input: TableListInput) -> QueryResult {
        let server_name = match required(input.server_name.as_deref(), "server_name") {
            Ok(v) => v,
            Err(e) => return QueryResult::failure(&e),
        };

        match self.registry.get_agent(&server_name).await {
            Ok(agent) => {
                info!(server = %server_name, "get_table_list");
                agent.get_table_list().await
            }
            Err(e) => QueryResult::failure(&e).with_server_name(server_name),
        }
    }

    /// Handle the get_table_schema tool call.
    pub async fn get_table_schema(&self, input: TableSchemaInput) -> QueryResult {
        let server_name = match required(input.server_name.as_deref(), "server_name") {
            Ok(v) => v,
            Err(e) => return QueryResult::failure(&e),
        };
        let table_name = match required(input.table_name.as_deref(), "table_name") {
            Ok(v) => v,
            Err(e) => return QueryResult::failure(&e).with_server_name(server_name),
        };

        match self.registry.get_agent(&server_name).await {
            Ok(agent) => {
                info!(server = %server_name, table = %table_name, "get_table_schema");
                agent.get_table_schema(&table_name).await
            }
            Err(e) => QueryResult::failure(&e)
                .with_server_name(server_name)
                .with_table_name(table_name),
        }
    }
}
