//! Server name → agent registry.
//!
//! Built once from the configured server list. Agents are created on first
//! use and then live for the rest of the process.

use crate::db::agent::Agent;
use crate::db::connection::{Connector, SqlxConnector};
use crate::db::tunnel::{SshTunnelProvider, TunnelProvider};
use crate::error::{DbError, DbResult};
use crate::models::{ServerConfig, ServerSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct Registry {
    /// Configuration order is kept for listing
    servers: Vec<ServerConfig>,
    index: HashMap<String, usize>,
    agents: RwLock<HashMap<String, Arc<Agent>>>,
    tunnels: Arc<dyn TunnelProvider>,
    connector: Arc<dyn Connector>,
}

impl Registry {
    /// Registry using real SSH tunnels and sqlx connections.
    pub fn new(servers: Vec<ServerConfig>) -> DbResult<Self> {
        Self::with_backends(
            servers,
            Arc::new(SshTunnelProvider::new()),
            Arc::new(SqlxConnector::new()),
        )
    }

    /// Registry with explicit tunnel and connection backends.
    pub fn with_backends(
        servers: Vec<ServerConfig>,
        tunnels: Arc<dyn TunnelProvider>,
        connector: Arc<dyn Connector>,
    ) -> DbResult<Self> {
        let mut index = HashMap::with_capacity(servers.len());
        for (i, server) in servers.iter().enumerate() {
            if index.insert(server.name.clone(), i).is_some() {
                return Err(DbError::configuration(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
        }

        info!(servers = servers.len(), "Server registry initialized");
        Ok(Self {
            servers,
            index,
            agents: RwLock::new(HashMap::new()),
            tunnels,
            connector,
        })
    }

    /// Get the agent for `name`, creating it on first use.
    ///
    /// Every call for the same name returns the same agent.
    pub async fn get_agent(&self, name: &str) -> DbResult<Arc<Agent>> {
        if let Some(agent) = self.agents.read().await.get(name) {
            return Ok(agent.clone());
        }

        let config = self
            .index
            .get(name)
            .map(|&i| &self.servers[i])
            .ok_or_else(|| DbError::server_not_found(name))?;

        let mut agents = self.agents.write().await;
        let agent = agents.entry(name.to_string()).or_insert_with(|| {
            debug!(server = %name, "Creating agent");
            Arc::new(Agent::new(
                config.clone(),
                self.tunnels.clone(),
                self.connector.clone(),
            ))
        });
        Ok(agent.clone())
    }

    /// Credential-free summaries in configuration order.
    pub fn get_server_list(&self) -> Vec<ServerSummary> {
        self.servers.iter().map(ServerConfig::summary).collect()
    }

    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}
