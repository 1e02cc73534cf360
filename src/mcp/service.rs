//! MCP service implementation using rmcp.
//!
//! This module defines the SqlAgentService struct with every tool exposed via
//! the MCP protocol using the rmcp framework's macros. All SQL-running tools
//! return a [`QueryResult`]; failures are reported inside it with
//! `success: false` rather than as protocol errors.

use crate::db::Registry;
use crate::models::QueryResult;
use crate::tools::{
    AdminToolHandler, ExecuteSqlInput, ListServersOutput, ProcessListInput, QueryToolHandler,
    SchemaToolHandler, ServerToolHandler, StatusInput, TableListInput, TableMaintenanceInput,
    TableSchemaInput, VariablesInput,
};
use rmcp::Json;
use rmcp::{
    ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqlAgentService {
    /// Shared server registry
    registry: Arc<Registry>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl SqlAgentService {
    /// Create a new SqlAgentService instance.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    /// Server instructions, including every configured server name and description.
    pub fn instructions(&self) -> String {
        let servers = self
            .registry
            .get_server_list()
            .into_iter()
            .map(|s| {
                format!(
                    "## server_name: {}\n\n{} ({}, schema `{}`)",
                    s.name,
                    if s.description.is_empty() {
                        "No description"
                    } else {
                        s.description.as_str()
                    },
                    s.engine,
                    s.schema
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Tools for inspecting and querying MySQL and PostgreSQL servers.\n\
            \n\
            ## Workflow\n\
            1. Call `list_sql_servers` to get available server names\n\
            2. Use `get_table_list` and `get_table_schema` to explore a server\n\
            3. Use `execute_sql` to run statements; access is limited by the database user's grants\n\
            \n\
            ## Notes\n\
            - Every call opens a fresh connection (through SSH when configured) and closes it afterwards\n\
            - Row-producing statements return `rows` and `row_count`; others return `affected_rows`\n\
            - `mysql_*` tools only work on servers with engine `mysql`\n\
            \n\
            # Servers\n\
            \n\
            {}",
            servers
        )
    }
}

#[tool_router]
impl SqlAgentService {
    #[tool(
        description = "List all configured SQL servers.\nReturns name, description, engine, host, port and schema for each server."
    )]
    async fn list_sql_servers(&self) -> Json<ListServersOutput> {
        Json(ServerToolHandler::new(self.registry.clone()).list_servers())
    }

    #[tool(
        description = "Execute a SQL statement and return the result as JSON.\nRow-producing statements return rows and row_count; other statements are committed and return affected_rows."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteSqlInput>,
    ) -> Json<QueryResult> {
        Json(
            QueryToolHandler::new(self.registry.clone())
                .execute_sql(input)
                .await,
        )
    }

    #[tool(description = "List the tables and views of a server's configured schema.")]
    async fn get_table_list(
        &self,
        Parameters(input): Parameters<TableListInput>,
    ) -> Json<QueryResult> {
        Json(
            SchemaToolHandler::new(self.registry.clone())
                .get_table_list(input)
                .await,
        )
    }

    #[tool(
        description = "Get the columns of a table: name, data type, nullability and default, in ordinal order."
    )]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<TableSchemaInput>,
    ) -> Json<QueryResult> {
        Json(
            SchemaToolHandler::new(self.registry.clone())
                .get_table_schema(input)
                .await,
        )
    }

    #[tool(description = "Show MySQL global status counters (SHOW GLOBAL STATUS).\nMySQL servers only.")]
    async fn mysql_status(&self, Parameters(input): Parameters<StatusInput>) -> Json<QueryResult> {
        Json(AdminToolHandler::new(self.registry.clone()).status(input).await)
    }

    #[tool(description = "Show MySQL global variables (SHOW GLOBAL VARIABLES).\nMySQL servers only.")]
    async fn mysql_variables(
        &self,
        Parameters(input): Parameters<VariablesInput>,
    ) -> Json<QueryResult> {
        Json(
            AdminToolHandler::new(self.registry.clone())
                .variables(input)
                .await,
        )
    }

    #[tool(description = "Show running MySQL threads (SHOW [FULL] PROCESSLIST).\nMySQL servers only.")]
    async fn mysql_process_list(
        &self,
        Parameters(input): Parameters<ProcessListInput>,
    ) -> Json<QueryResult> {
        Json(
            AdminToolHandler::new(self.registry.clone())
                .process_list(input)
                .await,
        )
    }

    #[tool(
        description = "Run CHECK, ANALYZE, OPTIMIZE or REPAIR TABLE on a MySQL table.\nMySQL servers only."
    )]
    async fn mysql_table_maintenance(
        &self,
        Parameters(input): Parameters<TableMaintenanceInput>,
    ) -> Json<QueryResult> {
        Json(
            AdminToolHandler::new(self.registry.clone())
                .table_maintenance(input)
                .await,
        )
    }
}

#[tool_handler]
impl ServerHandler for SqlAgentService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-agent-mcp-server".to_owned(),
                title: Some("SQL Agent MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions()),
        }
    }
}
