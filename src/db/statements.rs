//! Generated SQL text.
//!
//! Every statement the server builds on its own (catalog lookups and the
//! MySQL administrative commands) comes from here. Identifiers taken from
//! tool arguments are checked against an allow-list before they are
//! interpolated; the configured schema is embedded as an escaped literal.

use crate::error::{DbError, DbResult};
use crate::models::Engine;
use std::str::FromStr;

/// Longest identifier MySQL and PostgreSQL both accept.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// MySQL table maintenance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOp {
    Check,
    Analyze,
    Optimize,
    Repair,
}

impl MaintenanceOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Check => "CHECK",
            Self::Analyze => "ANALYZE",
            Self::Optimize => "OPTIMIZE",
            Self::Repair => "REPAIR",
        }
    }
}

impl FromStr for MaintenanceOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Self::Check),
            "analyze" => Ok(Self::Analyze),
            "optimize" => Ok(Self::Optimize),
            "repair" => Ok(Self::Repair),
            other => Err(DbError::invalid_input(format!(
                "unknown maintenance operation '{}' (expected check, analyze, optimize or repair)",
                other
            ))),
        }
    }
}

/// Administrative command restricted to MySQL servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Status { pattern: Option<String> },
    Variables { pattern: Option<String> },
    ProcessList { full: bool },
    TableMaintenance { table: String, op: MaintenanceOp },
}

impl AdminCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Variables { .. } => "variables",
            Self::ProcessList { .. } => "process_list",
            Self::TableMaintenance { .. } => "table_maintenance",
        }
    }

    /// Table the command targets, if any.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::TableMaintenance { table, .. } => Some(table),
            _ => None,
        }
    }
}

/// Check a table or column name against `[A-Za-z0-9_$]{1,64}`.
pub fn validate_identifier<'a>(kind: &str, value: &'a str) -> DbResult<&'a str> {
    check_chars(kind, value, |c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Same as [`validate_identifier`] but also allows the `%` wildcard.
pub fn validate_pattern<'a>(value: &'a str) -> DbResult<&'a str> {
    check_chars("pattern", value, |c| {
        c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '%'
    })
}

fn check_chars<'a>(kind: &str, value: &'a str, allowed: impl Fn(char) -> bool) -> DbResult<&'a str> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::invalid_input(format!(
            "{} must be 1-{} characters",
            kind, MAX_IDENTIFIER_LEN
        )));
    }
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(DbError::invalid_input(format!(
            "{} '{}' contains disallowed character '{}'",
            kind, value, bad
        )));
    }
    Ok(value)
}

/// Quote a value as a single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Engine {
    /// Tables and views of the configured schema.
    pub fn table_list_sql(&self, schema: &str) -> String {
        let schema = quote_literal(schema);
        match self {
            Self::MySql => format!(
                "SELECT TABLE_NAME AS table_name, TABLE_TYPE AS table_type \
                 FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = {} \
                 ORDER BY TABLE_NAME",
                schema
            ),
            Self::Postgres => format!(
                "SELECT table_schema, table_name, table_type \
                 FROM information_schema.tables \
                 WHERE table_catalog = {} \
                 AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                 ORDER BY table_schema, table_name",
                schema
            ),
        }
    }

    /// Columns of one table, in ordinal order (per schema on PostgreSQL).
    pub fn table_schema_sql(&self, schema: &str, table: &str) -> DbResult<String> {
        let table = validate_identifier("table_name", table)?;
        let schema = quote_literal(schema);
        Ok(match self {
            Self::MySql => format!(
                "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, \
                 IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = {} AND TABLE_NAME = '{}' \
                 ORDER BY ORDINAL_POSITION",
                schema, table
            ),
            // Same-named tables may exist in several schemas; each column is
            // tagged with its schema and the schemas are kept apart.
            Self::Postgres => format!(
                "SELECT table_schema, column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_catalog = {} AND table_name = '{}' \
                 AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                 ORDER BY table_schema, ordinal_position",
                schema, table
            ),
        })
    }

    /// Statement for an administrative command, or `None` when this engine
    /// does not support administrative commands.
    pub fn admin_sql(&self, cmd: &AdminCommand) -> DbResult<Option<String>> {
        if *self != Self::MySql {
            return Ok(None);
        }

        let sql = match cmd {
            AdminCommand::Status { pattern } => show_with_pattern("SHOW GLOBAL STATUS", pattern)?,
            AdminCommand::Variables { pattern } => {
                show_with_pattern("SHOW GLOBAL VARIABLES", pattern)?
            }
            AdminCommand::ProcessList { full: true } => "SHOW FULL PROCESSLIST".to_string(),
            AdminCommand::ProcessList { full: false } => "SHOW PROCESSLIST".to_string(),
            AdminCommand::TableMaintenance { table, op } => {
                let table = validate_identifier("table_name", table)?;
                format!("{} TABLE `{}`", op.keyword(), table)
            }
        };
        Ok(Some(sql))
    }
}

fn show_with_pattern(base: &str, pattern: &Option<String>) -> DbResult<String> {
    match pattern.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Ok(format!("{} LIKE '{}'", base, validate_pattern(p)?)),
        None => Ok(base.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("table_name", "users").is_ok());
        assert!(validate_identifier("table_name", "order_items_2024").is_ok());
        assert!(validate_identifier("table_name", "tmp$1").is_ok());

        let err = validate_identifier("table_name", "users; DROP TABLE x").unwrap_err();
        assert_eq!(err.kind(), "InvalidInputError");
        assert!(validate_identifier("table_name", "").is_err());
        assert!(validate_identifier("table_name", "a'b").is_err());
        assert!(validate_identifier("table_name", &"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_pattern_allows_wildcard() {
        assert!(validate_pattern("innodb_%").is_ok());
        assert!(validate_pattern("%' OR '1'='1").is_err());
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("app"), "'app'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_table_list_sql() {
        let mysql = Engine::MySql.table_list_sql("app");
        assert!(mysql.contains("information_schema.TABLES"));
        assert!(mysql.contains("TABLE_SCHEMA = 'app'"));

        let pg = Engine::Postgres.table_list_sql("app");
        assert!(pg.contains("table_catalog = 'app'"));
        assert!(pg.contains("NOT IN ('pg_catalog', 'information_schema')"));
    }

    #[test]
    fn test_table_schema_sql() {
        let sql = Engine::MySql.table_schema_sql("app", "users").unwrap();
        assert!(sql.contains("TABLE_NAME = 'users'"));
        assert!(sql.ends_with("ORDER BY ORDINAL_POSITION"));

        let sql = Engine::Postgres.table_schema_sql("app", "users").unwrap();
        assert!(sql.contains("table_name = 'users'"));
        assert!(sql.ends_with("ORDER BY table_schema, ordinal_position"));

        assert!(Engine::Postgres.table_schema_sql("app", "users--").is_err());
    }

    #[test]
    fn test_postgres_table_schema_keeps_schemas_apart() {
        let sql = Engine::Postgres.table_schema_sql("app", "events").unwrap();
        assert!(sql.starts_with("SELECT table_schema, column_name"));
        assert!(sql.contains("table_schema NOT IN ('pg_catalog', 'information_schema')"));
    }

    #[test]
    fn test_admin_sql_mysql() {
        let engine = Engine::MySql;
        let sql = |cmd| engine.admin_sql(&cmd).unwrap().unwrap();

        assert_eq!(sql(AdminCommand::Status { pattern: None }), "SHOW GLOBAL STATUS");
        assert_eq!(
            sql(AdminCommand::Status {
                pattern: Some("Threads_%".to_string())
            }),
            "SHOW GLOBAL STATUS LIKE 'Threads_%'"
        );
        assert_eq!(
            sql(AdminCommand::Variables {
                pattern: Some("  ".to_string())
            }),
            "SHOW GLOBAL VARIABLES"
        );
        assert_eq!(sql(AdminCommand::ProcessList { full: true }), "SHOW FULL PROCESSLIST");
        assert_eq!(sql(AdminCommand::ProcessList { full: false }), "SHOW PROCESSLIST");
        assert_eq!(
            sql(AdminCommand::TableMaintenance {
                table: "orders".to_string(),
                op: MaintenanceOp::Optimize
            }),
            "OPTIMIZE TABLE `orders`"
        );
    }

    #[test]
    fn test_admin_sql_postgres_is_unsupported() {
        let cmd = AdminCommand::ProcessList { full: false };
        assert!(Engine::Postgres.admin_sql(&cmd).unwrap().is_none());
    }

    #[test]
    fn test_maintenance_op_parse() {
        assert_eq!("Analyze".parse::<MaintenanceOp>().unwrap(), MaintenanceOp::Analyze);
        assert_eq!("REPAIR".parse::<MaintenanceOp>().unwrap(), MaintenanceOp::Repair);
        let err = "truncate".parse::<MaintenanceOp>().unwrap_err();
        assert!(err.to_string().contains("truncate"));
    }
}
