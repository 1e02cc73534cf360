//! MySQL administrative tools.
//!
//! `mysql_status`, `mysql_variables`, `mysql_process_list` and
//! `mysql_table_maintenance`. Each is rejected with a wrong-engine failure
//! when the target server is not MySQL.

use crate::db::{AdminCommand, MaintenanceOp, Registry};
use crate::error::DbResult;
use crate::models::QueryResult;
use crate::tools::required;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Input for the mysql_status tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StatusInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// Optional LIKE pattern, e.g. "Threads_%"
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Input for the mysql_variables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct VariablesInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// Optional LIKE pattern, e.g. "innodb_buffer%"
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Input for the mysql_process_list tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ProcessListInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// Show full statement text (SHOW FULL PROCESSLIST). Default: false
    #[serde(default)]
    pub full: Option<bool>,
}

/// Input for the mysql_table_maintenance tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TableMaintenanceInput {
    /// Server name from list_sql_servers
    #[serde(default)]
    pub server_name: Option<String>,
    /// Table to maintain
    #[serde(default)]
    pub table_name: Option<String>,
    /// One of: check, analyze, optimize, repair
    #[serde(default)]
    pub operation: Option<String>,
}

/// Handler for MySQL administrative commands.
pub struct AdminToolHandler {
    registry: Arc<Registry>,
}

impl AdminToolHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub async fn status(&self, input: StatusInput) -> QueryResult {
        self.run(input.server_name.as_deref(), || {
            Ok(AdminCommand::Status {
                pattern: input.pattern.clone(),
            })
        })
        .await
    }

    pub async fn variables(&self, input: VariablesInput) -> QueryResult {
        self.run(input.server_name.as_deref(), || {
            Ok(AdminCommand::Variables {
                pattern: input.pattern.clone(),
            })
        })
        .await
    }

    pub async fn process_list(&self, input: ProcessListInput) -> QueryResult {
        self.run(input.server_name.as_deref(), || {
            Ok(AdminCommand::ProcessList {
                full: input.full.unwrap_or(false),
            })
        })
        .await
    }

    pub async fn table_maintenance(&self, input: TableMaintenanceInput) -> QueryResult {
        self.run(input.server_name.as_deref(), || {
            let table = required(input.table_name.as_deref(), "table_name")?;
            let op: MaintenanceOp = required(input.operation.as_deref(), "operation")?.parse()?;
            Ok(AdminCommand::TableMaintenance { table, op })
        })
        .await
    }

    /// Validate arguments, resolve the agent and hand over the command.
    async fn run(
        &self,
        server_name: Option<&str>,
        build: impl FnOnce() -> DbResult<AdminCommand>,
    ) -> QueryResult {
        let server_name = match required(server_name, "server_name") {
            Ok(v) => v,
            Err(e) => return QueryResult::failure(&e),
        };
        let cmd = match build() {
            Ok(cmd) => cmd,
            Err(e) => return QueryResult::failure(&e).with_server_name(server_name),
        };

        match self.registry.get_agent(&server_name).await {
            Ok(agent) => agent.admin(cmd).await,
            Err(e) => QueryResult::failure(&e).with_server_name(server_name),
        }
    }
}
