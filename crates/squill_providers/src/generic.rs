use crate::util::{query_columns, query_objects, query_strings, sql_literal};
use squill_core::{
    Adapter, ColumnInfo, ConnectionConfig, DatabaseCursor, DbError, DriverConnection, MissingDriver,
    ObjectRef,
};

/// Identifier quoting styles across the analytic backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    DoubleQuote,
    Backtick,
}

/// Adapter for backends without a bundled driver shim (DuckDB, ClickHouse,
/// Snowflake, BigQuery, Athena, Turso).
///
/// The dialect surface (quoting, capability flags, metadata SQL) is fully
/// implemented; `connect` reports the missing driver with its install
/// hint. A driver shim can be wired in later without touching callers.
pub struct GenericSqlAdapter {
    db_type: &'static str,
    display_name: &'static str,
    driver_extra: &'static str,
    driver_package: &'static str,
    quote: QuoteStyle,
    databases_sql: Option<&'static str>,
    tables_sql: &'static str,
    views_sql: Option<&'static str>,
    can_switch_database: bool,
    procedures: bool,
}

impl GenericSqlAdapter {
    pub fn duckdb() -> Self {
        Self {
            db_type: "duckdb",
            display_name: "DuckDB",
            driver_extra: "duckdb",
            driver_package: "duckdb",
            quote: QuoteStyle::DoubleQuote,
            databases_sql: None,
            tables_sql: "SELECT table_schema, table_name FROM information_schema.tables \
                         WHERE table_type = 'BASE TABLE' ORDER BY table_name",
            views_sql: Some(
                "SELECT table_schema, table_name FROM information_schema.views ORDER BY table_name",
            ),
            can_switch_database: false,
            procedures: false,
        }
    }

    pub fn clickhouse() -> Self {
        Self {
            db_type: "clickhouse",
            display_name: "ClickHouse",
            driver_extra: "clickhouse",
            driver_package: "clickhouse",
            quote: QuoteStyle::Backtick,
            databases_sql: Some(
                "SELECT name FROM system.databases WHERE name NOT IN ('system') ORDER BY name",
            ),
            tables_sql: "SELECT database, name FROM system.tables \
                         WHERE database = currentDatabase() AND NOT is_temporary ORDER BY name",
            views_sql: Some(
                "SELECT database, name FROM system.tables \
                 WHERE database = currentDatabase() AND engine LIKE '%View' ORDER BY name",
            ),
            can_switch_database: true,
            procedures: false,
        }
    }

    pub fn snowflake() -> Self {
        Self {
            db_type: "snowflake",
            display_name: "Snowflake",
            driver_extra: "snowflake",
            driver_package: "snowflake-api",
            quote: QuoteStyle::DoubleQuote,
            databases_sql: Some("SELECT database_name FROM information_schema.databases ORDER BY database_name"),
            tables_sql: "SELECT table_schema, table_name FROM information_schema.tables \
                         WHERE table_type = 'BASE TABLE' ORDER BY table_schema, table_name",
            views_sql: Some(
                "SELECT table_schema, table_name FROM information_schema.views \
                 ORDER BY table_schema, table_name",
            ),
            can_switch_database: true,
            procedures: true,
        }
    }

    pub fn bigquery() -> Self {
        Self {
            db_type: "bigquery",
            display_name: "BigQuery",
            driver_extra: "bigquery",
            driver_package: "gcp-bigquery-client",
            quote: QuoteStyle::Backtick,
            databases_sql: None,
            tables_sql: "SELECT table_schema, table_name FROM INFORMATION_SCHEMA.TABLES \
                         WHERE table_type = 'BASE TABLE' ORDER BY table_name",
            views_sql: Some(
                "SELECT table_schema, table_name FROM INFORMATION_SCHEMA.VIEWS ORDER BY table_name",
            ),
            can_switch_database: false,
            procedures: false,
        }
    }

    pub fn athena() -> Self {
        Self {
            db_type: "athena",
            display_name: "Athena",
            driver_extra: "athena",
            driver_package: "aws-sdk-athena",
            quote: QuoteStyle::DoubleQuote,
            databases_sql: Some("SHOW DATABASES"),
            tables_sql: "SELECT table_schema, table_name FROM information_schema.tables \
                         ORDER BY table_name",
            views_sql: None,
            can_switch_database: false,
            procedures: false,
        }
    }

    pub fn turso() -> Self {
        Self {
            db_type: "turso",
            display_name: "Turso",
            driver_extra: "turso",
            driver_package: "libsql",
            quote: QuoteStyle::DoubleQuote,
            databases_sql: None,
            tables_sql: "SELECT name FROM sqlite_master \
                         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            views_sql: Some("SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name"),
            can_switch_database: false,
            procedures: false,
        }
    }
}

impl Adapter for GenericSqlAdapter {
    fn db_type(&self) -> &str {
        self.db_type
    }

    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        Err(DbError::MissingDriver(MissingDriver::new(
            self.display_name,
            self.driver_extra,
            self.driver_package,
        )))
    }

    fn list_databases(&self, conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        match self.databases_sql {
            Some(sql) => query_strings(conn, sql),
            None => Ok(Vec::new()),
        }
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(conn, self.tables_sql)
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        match self.views_sql {
            Some(sql) => query_objects(conn, sql),
            None => Ok(Vec::new()),
        }
    }

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        let schema_clause = match schema {
            Some(s) => format!("table_schema = {} AND ", sql_literal(s)),
            None => String::new(),
        };
        let sql = format!(
            "SELECT column_name, data_type, is_nullable, 'false' \
             FROM information_schema.columns WHERE {}table_name = {} \
             ORDER BY ordinal_position",
            schema_clause,
            sql_literal(table),
        );
        query_columns(conn, &sql)
    }

    fn cursor_for_database(
        &self,
        conn: &dyn DriverConnection,
        _config: &ConnectionConfig,
        database: Option<&str>,
    ) -> Result<DatabaseCursor, DbError> {
        let mut cursor = conn.cursor()?;
        if self.can_switch_database
            && let Some(db) = database
        {
            cursor.execute(&format!("USE {}", self.quote_identifier(db)))?;
        }
        Ok(DatabaseCursor::Current(cursor))
    }

    fn quote_identifier(&self, name: &str) -> String {
        match self.quote {
            QuoteStyle::DoubleQuote => format!("\"{}\"", name.replace('"', "\"\"")),
            QuoteStyle::Backtick => format!("`{}`", name.replace('`', "``")),
        }
    }

    fn supports_stored_procedures(&self) -> bool {
        self.procedures
    }

    fn supports_triggers(&self) -> bool {
        false
    }

    fn supports_multiple_databases(&self) -> bool {
        self.databases_sql.is_some()
    }
}
