//! Error types for the SQL Agent MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant is eventually rendered into a failure-shaped tool result, so the
//! messages are written to be actionable for an AI assistant reading them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Server not found: {server_name}")]
    ServerNotFound { server_name: String },

    #[error("Unsupported engine: {engine} (expected 'mysql' or 'postgres')")]
    UnsupportedEngine { engine: String },

    #[error("Server '{server_name}' uses engine '{engine}', but this operation requires '{required}'")]
    WrongEngine {
        server_name: String,
        engine: String,
        required: String,
    },

    #[error("Connection to '{server_name}' failed: {message}")]
    Connection {
        server_name: String,
        message: String,
        suggestion: String,
    },

    #[error("Query execution failed: {message}")]
    QueryExecution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("{parameter} is not specified")]
    MissingParameter { parameter: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a server not found error.
    pub fn server_not_found(server_name: impl Into<String>) -> Self {
        Self::ServerNotFound {
            server_name: server_name.into(),
        }
    }

    /// Create an unsupported engine error naming the offending value.
    pub fn unsupported_engine(engine: impl Into<String>) -> Self {
        Self::UnsupportedEngine {
            engine: engine.into(),
        }
    }

    /// Create a wrong engine error for an engine-restricted operation.
    pub fn wrong_engine(
        server_name: impl Into<String>,
        engine: impl Into<String>,
        required: impl Into<String>,
    ) -> Self {
        Self::WrongEngine {
            server_name: server_name.into(),
            engine: engine.into(),
            required: required.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(
        server_name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Connection {
            server_name: server_name.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query execution error with optional SQL state.
    pub fn query_execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a missing parameter error.
    pub fn missing_parameter(parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            parameter: parameter.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the server name to a connection error that was raised without one.
    pub fn with_server(self, name: &str) -> Self {
        match self {
            Self::Connection {
                server_name,
                message,
                suggestion,
            } if server_name.is_empty() => Self::Connection {
                server_name: name.to_string(),
                message,
                suggestion,
            },
            other => other,
        }
    }

    /// Short category name reported alongside the message in tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::ServerNotFound { .. } => "ServerNotFoundError",
            Self::UnsupportedEngine { .. } => "UnsupportedEngineError",
            Self::WrongEngine { .. } => "WrongEngineError",
            Self::Connection { .. } => "ConnectionError",
            Self::QueryExecution { .. } => "QueryExecutionError",
            Self::MissingParameter { .. } => "MissingParameterError",
            Self::InvalidInput { .. } => "InvalidInputError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::ServerNotFound { .. } => Some("Call list_sql_servers to get the configured server names"),
            Self::WrongEngine { .. } => Some("Use execute_sql with an engine-appropriate statement instead"),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Transport-level failures become connection errors without a server name;
/// callers attach it with [`DbError::with_server`].
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                "",
                msg.to_string(),
                "Check the server configuration and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query_execution(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                "",
                format!("I/O error: {}", io_err),
                "Check network connectivity, the SSH tunnel and the database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                "",
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                "",
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => DbError::query_execution(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                DbError::query_execution(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            other => DbError::query_execution(other.to_string(), None),
        }
    }
}

impl From<russh::Error> for DbError {
    fn from(err: russh::Error) -> Self {
        DbError::connection(
            "",
            format!("SSH error: {}", err),
            "Verify the SSH server is reachable and allows TCP forwarding",
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
