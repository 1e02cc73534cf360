//! SQL Agent MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to inspect and query MySQL and PostgreSQL servers, optionally through SSH
//! tunnels. Every query opens its own tunnel and connection and tears both
//! down before returning.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::Registry;
pub use error::{DbError, DbResult};
pub use mcp::SqlAgentService;
