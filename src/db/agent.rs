//! Per-server agent.
//!
//! An [`Agent`] owns the connection lifecycle for one configured server. Each
//! call runs through the same sequence:
//!
//! ```text
//! IDLE -> TUNNELING? -> CONNECTING -> EXECUTING -> ROWS | MUTATION -> TEARDOWN -> DONE
//!                \____________\____________\______________________/
//!                                   error -> TEARDOWN -> FAILED
//! ```
//!
//! Teardown is owned by [`Session`]: it closes the connection and then stops
//! the tunnel, exactly once, on every path. A per-agent mutex keeps at most one
//! connection and one tunnel alive per server.

use crate::db::connection::{Connector, DbConnection, Endpoint};
use crate::db::executor::{QueryExecutor, sql_preview};
use crate::db::statements::AdminCommand;
use crate::db::tunnel::{Tunnel, TunnelProvider};
use crate::error::{DbError, DbResult};
use crate::models::{Engine, QueryResult, ServerConfig};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Resources held for the duration of one query.
///
/// Released in reverse acquisition order by [`Session::release`]. If a
/// session is dropped without being released (the future was cancelled), the
/// remaining resources are dropped, which aborts the connection and cancels
/// tunnel forwarding.
struct Session {
    server: String,
    tunnel: Option<Box<dyn Tunnel>>,
    conn: Option<Box<dyn DbConnection>>,
}

impl Session {
    /// Acquire the tunnel (if configured), then the connection.
    async fn open(
        config: &ServerConfig,
        tunnels: &dyn TunnelProvider,
        connector: &dyn Connector,
    ) -> DbResult<Self> {
        let mut session = Self {
            server: config.name.clone(),
            tunnel: None,
            conn: None,
        };

        // A failed tunnel start leaves nothing to tear down
        if let Some(ssh) = &config.ssh_tunnel {
            let tunnel = tunnels
                .open(config, ssh)
                .await
                .map_err(|e| e.with_server(&config.name))?;
            session.tunnel = Some(tunnel);
        }

        let endpoint = Endpoint::resolve(config, session.tunnel.as_deref());
        match connector.connect(config, &endpoint).await {
            Ok(conn) => {
                session.conn = Some(conn);
                Ok(session)
            }
            Err(e) => {
                session.release().await;
                Err(e.with_server(&config.name))
            }
        }
    }

    fn connection(&mut self) -> DbResult<&mut dyn DbConnection> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(DbError::internal("session has no open connection")),
        }
    }

    /// Close the connection, then stop the tunnel. Failures are logged only.
    async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close().await {
                Ok(()) => info!(server = %self.server, "Disconnected from database"),
                Err(e) => warn!(server = %self.server, error = %e, "Failed to close database connection"),
            }
        }
        if let Some(tunnel) = self.tunnel.take() {
            tunnel.stop().await;
            info!(server = %self.server, "SSH tunnel closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.conn.is_some() || self.tunnel.is_some() {
            warn!(server = %self.server, "Session dropped before release, aborting connection and tunnel");
        }
    }
}

/// Connection lifecycle owner for one configured server.
pub struct Agent {
    config: ServerConfig,
    tunnels: Arc<dyn TunnelProvider>,
    connector: Arc<dyn Connector>,
    executor: QueryExecutor,
    /// Held for the whole of each query
    busy: Mutex<()>,
}

impl Agent {
    pub fn new(
        config: ServerConfig,
        tunnels: Arc<dyn TunnelProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            tunnels,
            connector,
            executor: QueryExecutor::new(),
            busy: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn engine(&self) -> Engine {
        self.config.engine
    }

    /// Run arbitrary SQL. Errors come back as a failure-shaped result.
    pub async fn run_query(&self, sql: &str) -> QueryResult {
        match self.execute(sql).await {
            Ok(result) => result,
            Err(e) => self.failure(&e, sql),
        }
    }

    /// List tables of the configured schema.
    pub async fn get_table_list(&self) -> QueryResult {
        let sql = self.config.engine.table_list_sql(&self.config.schema);
        self.run_query(&sql).await
    }

    /// Describe the columns of `table_name`.
    pub async fn get_table_schema(&self, table_name: &str) -> QueryResult {
        let result = match self
            .config
            .engine
            .table_schema_sql(&self.config.schema, table_name)
        {
            Ok(sql) => self.run_query(&sql).await,
            Err(e) => self.failure(&e, ""),
        };
        result.with_table_name(table_name)
    }

    /// Run a MySQL administrative command.
    ///
    /// Against any other engine this fails with `WrongEngine` and no SQL is
    /// sent; no tunnel or connection is opened either.
    pub async fn admin(&self, cmd: AdminCommand) -> QueryResult {
        let result = match self.config.engine.admin_sql(&cmd) {
            Ok(Some(sql)) => {
                info!(server = %self.config.name, command = cmd.name(), "Running administrative command");
                self.run_query(&sql).await
            }
            Ok(None) => {
                let err = DbError::wrong_engine(
                    &self.config.name,
                    self.config.engine.as_str(),
                    Engine::MySql.as_str(),
                );
                warn!(server = %self.config.name, command = cmd.name(), "Rejected administrative command for engine");
                self.failure(&err, "")
            }
            Err(e) => self.failure(&e, ""),
        };
        match cmd.table_name() {
            Some(table) => result.with_table_name(table),
            None => result,
        }
    }

    /// The full tunnel → connect → execute → teardown sequence.
    async fn execute(&self, sql: &str) -> DbResult<QueryResult> {
        let span = info_span!("query", server = %self.config.name, session = %Uuid::new_v4());
        async {
            let _busy = self.busy.lock().await;
            info!(sql = %sql_preview(sql), "Query started");

            let mut session =
                Session::open(&self.config, self.tunnels.as_ref(), self.connector.as_ref()).await?;

            let result = match session.connection() {
                Ok(conn) => self
                    .executor
                    .execute(conn, &self.config.name, sql)
                    .await
                    .map_err(|e| e.with_server(&self.config.name)),
                Err(e) => Err(e),
            };
            session.release().await;

            if let Ok(r) = &result {
                info!(
                    row_count = ?r.row_count,
                    affected_rows = ?r.affected_rows,
                    "Query finished"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    fn failure(&self, err: &DbError, sql: &str) -> QueryResult {
        error!(server = %self.config.name, error = %err, "Query failed");
        QueryResult::failure(err)
            .with_server_name(&self.config.name)
            .with_query(sql)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
