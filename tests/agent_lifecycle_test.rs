//! Connection lifecycle tests: every query opens a tunnel (when configured)
//! and a connection, and releases both exactly once on every path.

mod common;

use common::{
    FakeConnector, FakeTunnelProvider, Script, TUNNEL_PORT, mysql_server, postgres_server,
    registry, tunneled,
};
use sql_agent_mcp_server::db::{AdminCommand, Endpoint, MaintenanceOp};
use sql_agent_mcp_server::models::{Row, SqlValue};
use std::sync::Arc;

fn backends(script: Script) -> (Arc<FakeTunnelProvider>, Arc<FakeConnector>) {
    (
        Arc::new(FakeTunnelProvider::new()),
        Arc::new(FakeConnector::new(script)),
    )
}

#[tokio::test]
async fn test_row_query_returns_rows_without_commit() {
    let rows = vec![
        Row::new().with("id", 1i64).with("name", "alice"),
        Row::new().with("id", 2i64).with("name", SqlValue::Null),
    ];
    let (tunnels, connector) = backends(Script::Rows(rows));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let agent = registry.get_agent("main").await.unwrap();
    let result = agent.run_query("SELECT id, name FROM users").await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.is_row_set());
    assert_eq!(result.row_count, Some(2));
    assert!(result.affected_rows.is_none());
    let rows = result.rows.unwrap();
    assert_eq!(rows[0]["name"], "alice");
    assert!(rows[1]["name"].is_null());
    assert_eq!(result.server_name.as_deref(), Some("main"));
    assert_eq!(result.query.as_deref(), Some("SELECT id, name FROM users"));

    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.commits(), 0);
    assert_eq!(connector.closes(), 1);
    assert_eq!(tunnels.opens(), 0);
}

#[tokio::test]
async fn test_empty_row_set_keeps_row_shape() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let agent = registry.get_agent("main").await.unwrap();
    let result = agent.run_query("SELECT * FROM users WHERE 1 = 0").await;

    assert!(result.is_row_set());
    assert_eq!(result.row_count, Some(0));
    assert!(result.affected_rows.is_none());
}

#[tokio::test]
async fn test_mutation_commits_and_reports_affected_rows() {
    let (tunnels, connector) = backends(Script::Affected(3));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let agent = registry.get_agent("main").await.unwrap();
    let result = agent
        .run_query("UPDATE users SET active = 0 WHERE last_login < '2020-01-01'")
        .await;

    assert!(result.is_mutation());
    assert_eq!(result.affected_rows, Some(3));
    assert!(result.rows.is_none());
    assert!(result.row_count.is_none());
    assert_eq!(connector.commits(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_tunneled_server_connects_through_local_port() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let result = agent.run_query("SELECT 1").await;

    assert!(result.success);
    assert_eq!(
        connector.endpoints(),
        vec![Endpoint {
            host: "127.0.0.1".to_string(),
            port: TUNNEL_PORT,
        }]
    );
    assert_eq!(tunnels.opens(), 1);
    assert_eq!(tunnels.stops(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn test_direct_server_connects_to_configured_host() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    registry.get_agent("main").await.unwrap().run_query("SELECT 1").await;

    assert_eq!(
        connector.endpoints(),
        vec![Endpoint {
            host: "db.internal".to_string(),
            port: 3306,
        }]
    );
}

#[tokio::test]
async fn test_failed_tunnel_never_connects() {
    let tunnels = Arc::new(FakeTunnelProvider::failing());
    let connector = Arc::new(FakeConnector::new(Script::Rows(vec![])));
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let result = agent.run_query("SELECT 1").await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("ConnectionError"));
    assert!(result.error.unwrap().contains("'remote'"));
    assert_eq!(result.query.as_deref(), Some("SELECT 1"));
    assert_eq!(connector.connects(), 0);
    assert!(connector.endpoints().is_empty());
    assert_eq!(tunnels.stops(), 0);
}

#[tokio::test]
async fn test_connect_failure_stops_tunnel_once() {
    let (tunnels, connector) = backends(Script::ConnectFails);
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let result = agent.run_query("SELECT 1").await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("ConnectionError"));
    assert_eq!(result.server_name.as_deref(), Some("remote"));
    assert_eq!(tunnels.opens(), 1);
    assert_eq!(tunnels.stops(), 1);
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn test_execution_failure_releases_everything_once() {
    let (tunnels, connector) = backends(Script::ExecuteFails);
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let result = agent.run_query("SELECT * FROM missing").await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("QueryExecutionError"));
    assert!(result.error.unwrap().contains("doesn't exist"));
    assert_eq!(result.query.as_deref(), Some("SELECT * FROM missing"));
    assert!(result.rows.is_none());
    assert_eq!(connector.commits(), 0);
    assert_eq!(connector.closes(), 1);
    assert_eq!(tunnels.stops(), 1);
}

#[tokio::test]
async fn test_commit_failure_is_reported_and_released() {
    let (tunnels, connector) = backends(Script::CommitFails);
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let result = agent.run_query("DELETE FROM sessions").await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("ConnectionError"));
    assert!(result.affected_rows.is_none());
    assert_eq!(connector.closes(), 1);
    assert_eq!(tunnels.stops(), 1);
}

#[tokio::test]
async fn test_each_query_uses_a_fresh_connection() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    for _ in 0..3 {
        assert!(agent.run_query("SELECT 1").await.success);
    }

    assert_eq!(connector.connects(), 3);
    assert_eq!(connector.closes(), 3);
    assert_eq!(tunnels.opens(), 3);
    assert_eq!(tunnels.stops(), 3);
}

#[tokio::test]
async fn test_concurrent_queries_on_one_agent_all_release() {
    let (tunnels, connector) = backends(Script::Affected(1));
    let registry = registry(vec![tunneled(mysql_server("remote"))], &tunnels, &connector);

    let agent = registry.get_agent("remote").await.unwrap();
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .run_query(&format!("INSERT INTO audit (n) VALUES ({i})"))
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_mutation());
    }
    assert_eq!(connector.commits(), 8);
    assert_eq!(connector.closes(), 8);
    assert_eq!(tunnels.stops(), 8);
}

#[tokio::test]
async fn test_table_list_uses_configured_schema() {
    let rows = vec![Row::new().with("table_name", "users").with("table_type", "BASE TABLE")];
    let (tunnels, connector) = backends(Script::Rows(rows));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let result = registry.get_agent("main").await.unwrap().get_table_list().await;

    assert_eq!(result.row_count, Some(1));
    let sql = &connector.statements()[0];
    assert!(sql.contains("information_schema.TABLES"));
    assert!(sql.contains("'app'"));
}

#[tokio::test]
async fn test_table_schema_attaches_table_name() {
    let rows = vec![
        Row::new()
            .with("column_name", "id")
            .with("data_type", "int")
            .with("is_nullable", "NO")
            .with("column_default", SqlValue::Null),
    ];
    let (tunnels, connector) = backends(Script::Rows(rows));
    let registry = registry(vec![postgres_server("analytics")], &tunnels, &connector);

    let result = registry
        .get_agent("analytics")
        .await
        .unwrap()
        .get_table_schema("events")
        .await;

    assert!(result.success);
    assert_eq!(result.table_name.as_deref(), Some("events"));
    assert!(connector.statements()[0].contains("'events'"));
}

#[tokio::test]
async fn test_invalid_table_name_sends_no_sql() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![tunneled(mysql_server("main"))], &tunnels, &connector);

    let result = registry
        .get_agent("main")
        .await
        .unwrap()
        .get_table_schema("users; DROP TABLE users")
        .await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("InvalidInputError"));
    assert_eq!(result.table_name.as_deref(), Some("users; DROP TABLE users"));
    assert_eq!(connector.executes(), 0);
    assert_eq!(tunnels.opens(), 0);
}

#[tokio::test]
async fn test_admin_on_postgres_is_wrong_engine_without_connecting() {
    let (tunnels, connector) = backends(Script::Rows(vec![]));
    let registry = registry(vec![tunneled(postgres_server("analytics"))], &tunnels, &connector);

    let agent = registry.get_agent("analytics").await.unwrap();
    let result = agent.admin(AdminCommand::ProcessList { full: true }).await;

    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("WrongEngineError"));
    let message = result.error.unwrap();
    assert!(message.contains("analytics"));
    assert!(message.contains("postgres"));
    assert!(result.query.is_none());
    assert_eq!(tunnels.opens(), 0);
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_admin_on_mysql_runs_show_statement() {
    let rows = vec![Row::new().with("Variable_name", "Threads_connected").with("Value", "4")];
    let (tunnels, connector) = backends(Script::Rows(rows));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let agent = registry.get_agent("main").await.unwrap();
    let result = agent
        .admin(AdminCommand::Status {
            pattern: Some("Threads_%".to_string()),
        })
        .await;

    assert!(result.is_row_set());
    assert_eq!(
        connector.statements(),
        vec!["SHOW GLOBAL STATUS LIKE 'Threads_%'".to_string()]
    );
}

#[tokio::test]
async fn test_table_maintenance_reports_table_name() {
    let rows = vec![Row::new().with("Table", "app.users").with("Msg_text", "OK")];
    let (tunnels, connector) = backends(Script::Rows(rows));
    let registry = registry(vec![mysql_server("main")], &tunnels, &connector);

    let agent = registry.get_agent("main").await.unwrap();
    let result = agent
        .admin(AdminCommand::TableMaintenance {
            table: "users".to_string(),
            op: MaintenanceOp::Analyze,
        })
        .await;

    assert!(result.success);
    assert_eq!(result.table_name.as_deref(), Some("users"));
    assert_eq!(connector.statements(), vec!["ANALYZE TABLE `users`".to_string()]);
}
