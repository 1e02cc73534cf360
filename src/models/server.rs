//! Server configuration models.
//!
//! This module defines the immutable description of a configured database
//! server, its optional SSH tunnel, and the credential-free summary returned
//! by `list_sql_servers`.

use crate::error::{DbError, DbResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default SSH port used when `ssh_tunnel.port` is omitted.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Includes MariaDB
    MySql,
    Postgres,
}

impl Engine {
    /// Configuration spelling of this engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Engine for a connection URL scheme, including the common aliases.
    pub fn from_url_scheme(scheme: &str) -> DbResult<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(DbError::unsupported_engine(scheme)),
        }
    }

    /// Get the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

impl FromStr for Engine {
    type Err = DbError;

    /// Only the exact configuration spellings are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::MySql),
            "postgres" => Ok(Self::Postgres),
            _ => Err(DbError::unsupported_engine(s)),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH tunnel settings nested under a server entry.
#[derive(Clone, Deserialize)]
pub struct SshTunnelConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// Resolved SSH authentication method.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("has_passphrase", &passphrase.is_some())
                .finish(),
            Self::Password(_) => f.write_str("Password(****)"),
        }
    }
}

impl SshTunnelConfig {
    /// Pick the authentication method: a private key wins over a password.
    pub fn auth(&self) -> DbResult<SshAuth> {
        if let Some(path) = self.private_key_path.as_deref().filter(|p| !p.is_empty()) {
            return Ok(SshAuth::PrivateKey {
                path: expand_home(path),
                passphrase: self.private_key_passphrase.clone(),
            });
        }
        if let Some(password) = &self.password {
            return Ok(SshAuth::Password(password.clone()));
        }
        Err(DbError::configuration(format!(
            "no SSH authentication material for {}@{}: set private_key_path or password",
            self.user, self.host
        )))
    }
}

impl std::fmt::Debug for SshTunnelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnelConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("private_key_path", &self.private_key_path)
            .finish_non_exhaustive()
    }
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Immutable description of one database target.
#[derive(Clone)]
pub struct ServerConfig {
    /// Unique key used by every tool call
    pub name: String,
    pub engine: Engine,
    pub host: String,
    pub port: u16,
    /// Database name (MySQL schema / PostgreSQL database)
    pub schema: String,
    pub user: String,
    /// Sensitive - never log or list
    pub password: String,
    pub description: Option<String>,
    pub ssh_tunnel: Option<SshTunnelConfig>,
}

impl ServerConfig {
    /// Build the credential-free summary for `list_sql_servers`.
    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            engine: self.engine,
            host: self.host.clone(),
            port: self.port,
            schema: self.schema.clone(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("user", &self.user)
            .field("ssh_tunnel", &self.ssh_tunnel)
            .finish_non_exhaustive()
    }
}

/// Server metadata returned by list_sql_servers (no secrets exposed).
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ServerSummary {
    /// Server name. Use this value in server_name parameter for all tool calls.
    pub name: String,
    pub description: String,
    /// Database engine: "mysql" or "postgres"
    pub engine: Engine,
    pub host: String,
    pub port: u16,
    pub schema: String,
}
