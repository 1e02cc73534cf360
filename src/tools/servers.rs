//! Server listing tool.

use crate::db::Registry;
use crate::models::ServerSummary;
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Output from the list_sql_servers tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListServersOutput {
    pub success: bool,
    pub servers: Vec<ServerSummary>,
    pub count: usize,
}

/// Handler for server listing.
pub struct ServerToolHandler {
    registry: Arc<Registry>,
}

impl ServerToolHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// List every configured server without credentials.
    pub fn list_servers(&self) -> ListServersOutput {
        let servers = self.registry.get_server_list();
        info!(count = servers.len(), "Listed servers");
        ListServersOutput {
            success: true,
            count: servers.len(),
            servers,
        }
    }
}
