use squill_core::{Adapter, ConnectionConfig, DatabaseCursor, Endpoint};
use squill_providers::{AzureSqlAdapter, MySqlAdapter, SqlServerAdapter};
use squill_test_support::FakeAdapter;

fn config(db_type: &str, database: &str) -> ConnectionConfig {
    ConnectionConfig::new(
        format!("{}-main", db_type),
        db_type,
        Endpoint::Tcp {
            host: "localhost".into(),
            port: Some(1433),
            database: Some(database.into()),
            username: Some("sa".into()),
            password: None,
        },
    )
}

#[test]
fn azure_cursor_never_issues_use() {
    // Azure SQL cannot switch databases: asking for another one still
    // returns a cursor bound to the configured database.
    let fake = FakeAdapter::new("azuresql");
    let conn = fake.connect(&config("azuresql", "main")).unwrap();

    let adapter = AzureSqlAdapter::new();
    let cursor = adapter
        .cursor_for_database(conn.as_ref(), &config("azuresql", "main"), Some("other"))
        .unwrap();

    assert!(matches!(cursor, DatabaseCursor::Current(_)));
    assert!(!adapter.supports_multiple_databases());

    let statements: Vec<String> = fake.stats().executed.into_iter().map(|(_, s)| s).collect();
    assert!(
        statements.iter().all(|s| !s.to_uppercase().starts_with("USE")),
        "azure adapter must not issue USE, got {:?}",
        statements
    );
}

#[test]
fn sqlserver_cursor_switches_with_use() {
    let fake = FakeAdapter::new("mssql");
    let conn = fake.connect(&config("mssql", "master")).unwrap();

    let adapter = SqlServerAdapter::new();
    adapter
        .cursor_for_database(conn.as_ref(), &config("mssql", "master"), Some("sales"))
        .unwrap();

    let statements: Vec<String> = fake.stats().executed.into_iter().map(|(_, s)| s).collect();
    assert_eq!(statements, vec!["USE [sales]"]);
}

#[test]
fn mysql_cursor_switches_with_backticked_use() {
    let fake = FakeAdapter::new("mysql");
    let conn = fake.connect(&config("mysql", "app")).unwrap();

    let adapter = MySqlAdapter::new();
    adapter
        .cursor_for_database(conn.as_ref(), &config("mysql", "app"), Some("analytics"))
        .unwrap();

    let statements: Vec<String> = fake.stats().executed.into_iter().map(|(_, s)| s).collect();
    assert_eq!(statements, vec!["USE `analytics`"]);
}

#[test]
fn database_override_produces_new_config() {
    let adapter = SqlServerAdapter::new();
    let base = config("mssql", "master");
    let overridden = adapter.apply_database_override(&base, "sales");

    assert_eq!(overridden.endpoint.database(), Some("sales"));
    // The original is untouched.
    assert_eq!(base.endpoint.database(), Some("master"));
}
