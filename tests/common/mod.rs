//! In-memory tunnel and connection backends for lifecycle tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sql_agent_mcp_server::db::{
    Connector, DbConnection, Endpoint, Registry, StatementOutcome, Tunnel, TunnelProvider,
};
use sql_agent_mcp_server::error::{DbError, DbResult};
use sql_agent_mcp_server::models::{
    DEFAULT_SSH_PORT, Engine, Row, ServerConfig, SshTunnelConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TUNNEL_PORT: u16 = 40123;

/// Counters shared by the fake tunnel provider and its tunnels.
#[derive(Default)]
pub struct TunnelStats {
    pub opens: AtomicUsize,
    pub stops: AtomicUsize,
}

pub struct FakeTunnelProvider {
    pub stats: Arc<TunnelStats>,
    fail: bool,
}

impl FakeTunnelProvider {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(TunnelStats::default()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn opens(&self) -> usize {
        self.stats.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stats.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelProvider for FakeTunnelProvider {
    async fn open(
        &self,
        _server: &ServerConfig,
        _ssh: &SshTunnelConfig,
    ) -> DbResult<Box<dyn Tunnel>> {
        if self.fail {
            return Err(DbError::connection(
                "",
                "SSH handshake failed",
                "Check the SSH host",
            ));
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTunnel {
            stats: self.stats.clone(),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct FakeTunnel {
    stats: Arc<TunnelStats>,
    stopped: AtomicBool,
}

#[async_trait]
impl Tunnel for FakeTunnel {
    fn local_port(&self) -> u16 {
        TUNNEL_PORT
    }

    async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.stats.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// How the next fake connection behaves.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<Row>),
    Affected(u64),
    ExecuteFails,
    CommitFails,
    ConnectFails,
}

/// Counters and recorded calls shared by the fake connector and its connections.
#[derive(Default)]
pub struct ConnStats {
    pub connects: AtomicUsize,
    pub executes: AtomicUsize,
    pub commits: AtomicUsize,
    pub closes: AtomicUsize,
    pub endpoints: Mutex<Vec<Endpoint>>,
    pub statements: Mutex<Vec<String>>,
}

pub struct FakeConnector {
    pub stats: Arc<ConnStats>,
    script: Mutex<Script>,
}

impl FakeConnector {
    pub fn new(script: Script) -> Self {
        Self {
            stats: Arc::new(ConnStats::default()),
            script: Mutex::new(script),
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn connects(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.stats.executes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.stats.commits.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.stats.closes.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.stats.endpoints.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.stats.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _server: &ServerConfig,
        endpoint: &Endpoint,
    ) -> DbResult<Box<dyn DbConnection>> {
        self.stats.endpoints.lock().unwrap().push(endpoint.clone());
        let script = self.script.lock().unwrap().clone();
        if let Script::ConnectFails = script {
            return Err(DbError::connection(
                "",
                "Access denied for user",
                "Check credentials",
            ));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            stats: self.stats.clone(),
            script,
        }))
    }
}

struct FakeConnection {
    stats: Arc<ConnStats>,
    script: Script,
}

#[async_trait]
impl DbConnection for FakeConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<StatementOutcome> {
        self.stats.executes.fetch_add(1, Ordering::SeqCst);
        self.stats.statements.lock().unwrap().push(sql.to_string());
        match &self.script {
            Script::Rows(rows) => Ok(StatementOutcome::Rows(rows.clone())),
            Script::Affected(n) => Ok(StatementOutcome::NoResultSet { rows_affected: *n }),
            Script::CommitFails => Ok(StatementOutcome::NoResultSet { rows_affected: 1 }),
            Script::ExecuteFails | Script::ConnectFails => Err(DbError::query_execution(
                "Table 'app.missing' doesn't exist",
                Some("42S02".to_string()),
            )),
        }
    }

    async fn commit(&mut self) -> DbResult<()> {
        if let Script::CommitFails = self.script {
            return Err(DbError::connection("", "connection reset", "Retry"));
        }
        self.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn mysql_server(name: &str) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        engine: Engine::MySql,
        host: "db.internal".to_string(),
        port: 3306,
        schema: "app".to_string(),
        user: "reader".to_string(),
        password: "s3cret-db".to_string(),
        description: Some(format!("{name} database")),
        ssh_tunnel: None,
    }
}

pub fn postgres_server(name: &str) -> ServerConfig {
    ServerConfig {
        engine: Engine::Postgres,
        port: 5432,
        schema: "warehouse".to_string(),
        ..mysql_server(name)
    }
}

pub fn tunneled(mut server: ServerConfig) -> ServerConfig {
    server.ssh_tunnel = Some(SshTunnelConfig {
        host: "bastion.example.com".to_string(),
        port: DEFAULT_SSH_PORT,
        user: "deploy".to_string(),
        password: Some("s3cret-ssh".to_string()),
        private_key_path: None,
        private_key_passphrase: None,
    });
    server
}

pub fn registry(
    servers: Vec<ServerConfig>,
    tunnels: &Arc<FakeTunnelProvider>,
    connector: &Arc<FakeConnector>,
) -> Arc<Registry> {
    Arc::new(
        Registry::with_backends(servers, tunnels.clone(), connector.clone())
            .expect("valid server list"),
    )
}
