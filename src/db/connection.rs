//! Database connection binding.
//!
//! Resolves where a server is reachable (direct or through a tunnel's local
//! port) and opens one native sqlx connection per query. The connection
//! reports each statement as a two-branch [`StatementOutcome`]; the executor
//! never inspects SQL text to decide the result shape.

use crate::db::tunnel::Tunnel;
use crate::db::types::DecodeRow;
use crate::error::{DbError, DbResult};
use crate::models::{Engine, Row, ServerConfig};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Either, Executor};
use tracing::{debug, info};

/// Host and port the database client dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Tunnel present: its loopback port. Otherwise the configured host/port.
    pub fn resolve(server: &ServerConfig, tunnel: Option<&dyn Tunnel>) -> Self {
        match tunnel {
            Some(t) => Self {
                host: "127.0.0.1".to_string(),
                port: t.local_port(),
            },
            None => Self {
                host: server.host.clone(),
                port: server.port,
            },
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What a single statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// The statement produced a result set (possibly empty).
    Rows(Vec<Row>),
    /// The statement produced no result set.
    NoResultSet { rows_affected: u64 },
}

/// A live database connection owned by one query.
#[async_trait]
pub trait DbConnection: Send {
    /// Run one SQL text inside an open transaction.
    async fn execute(&mut self, sql: &str) -> DbResult<StatementOutcome>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> DbResult<()>;

    /// Close the connection. Uncommitted work is rolled back by the server.
    async fn close(self: Box<Self>) -> DbResult<()>;
}

/// Opens database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerConfig,
        endpoint: &Endpoint,
    ) -> DbResult<Box<dyn DbConnection>>;
}

/// [`Connector`] backed by sqlx native drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlxConnector;

impl SqlxConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(
        &self,
        server: &ServerConfig,
        endpoint: &Endpoint,
    ) -> DbResult<Box<dyn DbConnection>> {
        debug!(server = %server.name, engine = %server.engine, %endpoint, "Opening database connection");

        let conn = match server.engine {
            Engine::MySql => MySqlConnectOptions::new()
                .host(&endpoint.host)
                .port(endpoint.port)
                .username(&server.user)
                .password(&server.password)
                .database(&server.schema)
                .charset("utf8mb4")
                .connect()
                .await
                .map(SqlxConnection::MySql),
            Engine::Postgres => PgConnectOptions::new()
                .host(&endpoint.host)
                .port(endpoint.port)
                .username(&server.user)
                .password(&server.password)
                .database(&server.schema)
                .connect()
                .await
                .map(SqlxConnection::Postgres),
        }
        .map_err(|e| {
            DbError::connection(
                &server.name,
                e.to_string(),
                "Check host, port, credentials and schema in the server configuration",
            )
        })?;

        info!(server = %server.name, %endpoint, "Database connection established");
        Ok(Box::new(conn))
    }
}

/// Native connection for either engine.
pub enum SqlxConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

/// Drain `fetch_many` for one connection type.
///
/// Keeps rows of the first result set that has any, sums affected counts, and
/// falls back to `describe` to tell an empty result set from no result set.
/// With `savepoint` set, a failed describe is rolled back to a savepoint so it
/// cannot abort the open transaction (PostgreSQL).
macro_rules! run_statement {
    ($conn:expr, $sql:expr, savepoint = $savepoint:expr) => {{
        let conn = $conn;
        let sql: &str = $sql;
        let mut rows: Vec<Row> = Vec::new();
        let mut rows_affected: u64 = 0;
        let mut collecting = true;
        {
            let mut stream = (&mut *conn).fetch_many(sql);
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => {
                        rows_affected += done.rows_affected();
                        if !rows.is_empty() {
                            collecting = false;
                        }
                    }
                    Either::Right(row) => {
                        if collecting {
                            rows.push(row.decode_row());
                        }
                    }
                }
            }
        }

        if !rows.is_empty() {
            Ok(StatementOutcome::Rows(rows))
        } else {
            // Outside a transaction block (the statement ended it) there is
            // nothing to protect and SAVEPOINT itself fails
            let savepoint: bool = $savepoint
                && (&mut *conn).execute("SAVEPOINT shape_describe").await.is_ok();
            let has_columns = match (&mut *conn).describe(sql).await {
                Ok(described) => !described.columns().is_empty(),
                Err(e) => {
                    debug!(error = %e, "Statement describe failed, treating as no result set");
                    if savepoint {
                        (&mut *conn)
                            .execute("ROLLBACK TO SAVEPOINT shape_describe")
                            .await?;
                    }
                    false
                }
            };
            if savepoint {
                (&mut *conn).execute("RELEASE SAVEPOINT shape_describe").await?;
            }
            if has_columns {
                Ok(StatementOutcome::Rows(rows))
            } else {
                Ok(StatementOutcome::NoResultSet { rows_affected })
            }
        }
    }};
}

#[async_trait]
impl DbConnection for SqlxConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<StatementOutcome> {
        match self {
            Self::MySql(conn) => {
                (&mut *conn).execute("BEGIN").await?;
                run_statement!(conn, sql, savepoint = false)
            }
            Self::Postgres(conn) => {
                (&mut *conn).execute("BEGIN").await?;
                run_statement!(conn, sql, savepoint = true)
            }
        }
    }

    async fn commit(&mut self) -> DbResult<()> {
        match self {
            Self::MySql(conn) => {
                (&mut *conn).execute("COMMIT").await?;
            }
            Self::Postgres(conn) => {
                (&mut *conn).execute("COMMIT").await?;
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        match *self {
            Self::MySql(conn) => conn.close().await?,
            Self::Postgres(conn) => conn.close().await?,
        }
        Ok(())
    }
}
