//! Query execution engine.
//!
//! Runs one SQL statement on an open connection and turns the driver's
//! [`StatementOutcome`] into a [`QueryResult`]:
//! - `Rows` → normalized rows, `row_count`, no commit
//! - `NoResultSet` → explicit commit, `affected_rows`
//!
//! Any driver error is returned as-is; the caller owns teardown.

use crate::db::connection::{DbConnection, StatementOutcome};
use crate::db::normalize::normalize_rows;
use crate::error::DbResult;
use crate::models::QueryResult;
use std::time::Instant;
use tracing::debug;

/// Longest SQL prefix written to the logs.
pub const LOGGED_SQL_LEN: usize = 100;

/// Truncate SQL text for logging.
pub fn sql_preview(sql: &str) -> &str {
    match sql.char_indices().nth(LOGGED_SQL_LEN) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

/// Stateless statement executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute `sql` and build the uniform result.
    pub async fn execute(
        &self,
        conn: &mut dyn DbConnection,
        server_name: &str,
        sql: &str,
    ) -> DbResult<QueryResult> {
        debug!(server = %server_name, sql = %sql_preview(sql), "Executing statement");

        let start = Instant::now();
        let outcome = conn.execute(sql).await?;

        match outcome {
            StatementOutcome::Rows(rows) => {
                let rows = normalize_rows(&rows);
                let execution_time_ms = elapsed_ms(start);
                debug!(server = %server_name, row_count = rows.len(), execution_time_ms, "Statement returned rows");
                Ok(QueryResult::rows(server_name, sql, rows, execution_time_ms))
            }
            StatementOutcome::NoResultSet { rows_affected } => {
                conn.commit().await?;
                let execution_time_ms = elapsed_ms(start);
                debug!(server = %server_name, rows_affected, execution_time_ms, "Statement committed");
                Ok(QueryResult::mutation(
                    server_name,
                    sql,
                    rows_affected,
                    execution_time_ms,
                ))
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
