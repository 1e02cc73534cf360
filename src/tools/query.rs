//! SQL execution tool.
//!
//! This module implements the `execute_sql` MCP tool. The statement is sent
//! as-is; the result shape (rows or affected rows) is decided by what the
//! database returns.

use crate::db::Registry;
use crate::db::executor::sql_preview;
use crate::models::QueryResult;
use crate::tools::required;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Input for the execute_sql tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// SQL statement to execute, e.g. "SELECT * FROM users"
    #[serde(default)]
    pub sql: Option<String>,
}

/// Handler for SQL execution.
pub struct QueryToolHandler {
    registry: Arc<Registry>,
}

impl QueryToolHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Handle the execute_sql tool call.
    ///
    /// A missing or blank argument fails before any agent is touched.
    pub async fn execute_sql(&self, input: ExecuteSqlInput) -> QueryResult {
        let server_name = match required(input.server_name.as_deref(), "server_name") {
            Ok(v) => v,
            Err(e) => return QueryResult::failure(&e),
        };
        // Blank text is rejected, but the statement runs exactly as sent
        let sql = match required(input.sql.as_deref(), "SQL query") {
            Ok(_) => input.sql.unwrap_or_default(),
            Err(e) => return QueryResult::failure(&e).with_server_name(server_name),
        };

        let agent = match self.registry.get_agent(&server_name).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(server = %server_name, error = %e, "Unknown server");
                return QueryResult::failure(&e)
                    .with_server_name(server_name)
                    .with_query(sql);
            }
        };

        info!(server = %server_name, sql = %sql_preview(&sql), "execute_sql");
        agent.run_query(&sql).await
    }
}
