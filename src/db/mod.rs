//! Database access layer.
//!
//! This module provides the per-request connection lifecycle:
//! - SSH tunnel provisioning
//! - Connection binding (direct or through a tunnel)
//! - Statement execution and result-shape detection
//! - Row decoding and value normalization
//! - Per-server agents and the registry that owns them

pub mod agent;
pub mod connection;
pub mod executor;
pub mod normalize;
pub mod registry;
pub mod statements;
pub mod tunnel;
pub mod types;

pub use agent::Agent;
pub use connection::{Connector, DbConnection, Endpoint, SqlxConnector, StatementOutcome};
pub use executor::QueryExecutor;
pub use registry::Registry;
pub use statements::{AdminCommand, MaintenanceOp};
pub use tunnel::{SshTunnelProvider, Tunnel, TunnelProvider};
