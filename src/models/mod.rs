//! Data models for the SQL Agent MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod server;
pub mod value;

// Re-export commonly used types
pub use query::{JsonRow, QueryResult};
pub use server::{
    DEFAULT_SSH_PORT, Engine, ServerConfig, ServerSummary, SshAuth, SshTunnelConfig, expand_home,
};
pub use value::{Row, SqlValue};
