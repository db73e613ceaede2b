use crate::util::{query_columns, query_objects, query_strings, sql_literal};
use squill_core::{
    Adapter, ColumnInfo, ConnectionConfig, DatabaseCursor, DbError, DriverConnection, MissingDriver,
    ObjectRef,
};

/// SQL Server adapter. No driver shim ships with squill, so `connect`
/// reports the missing driver with its install hint; the dialect surface
/// (quoting, `USE` switching, metadata SQL) is fully implemented and shared
/// with the Azure variant.
pub struct SqlServerAdapter {
    db_type: &'static str,
    display_name: &'static str,
}

impl SqlServerAdapter {
    pub fn new() -> Self {
        Self {
            db_type: "mssql",
            display_name: "SQL Server",
        }
    }
}

impl Default for SqlServerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for SqlServerAdapter {
    fn db_type(&self) -> &str {
        self.db_type
    }

    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        Err(DbError::MissingDriver(MissingDriver::new(
            self.display_name,
            "mssql",
            "tiberius",
        )))
    }

    fn list_databases(&self, conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        query_strings(
            conn,
            "SELECT name FROM sys.databases WHERE database_id > 4 ORDER BY name",
        )
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_SCHEMA, TABLE_NAME",
        )
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.VIEWS \
             ORDER BY TABLE_SCHEMA, TABLE_NAME",
        )
    }

    fn list_procedures(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT ROUTINE_SCHEMA, ROUTINE_NAME FROM INFORMATION_SCHEMA.ROUTINES \
             WHERE ROUTINE_TYPE = 'PROCEDURE' ORDER BY ROUTINE_NAME",
        )
    }

    fn list_triggers(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT SCHEMA_NAME(o.schema_id), t.name FROM sys.triggers t \
             JOIN sys.objects o ON t.parent_id = o.object_id \
             ORDER BY t.name",
        )
    }

    fn list_sequences(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT SCHEMA_NAME(schema_id), name FROM sys.sequences ORDER BY name",
        )
    }

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        let sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, 'false' \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            sql_literal(schema.unwrap_or("dbo")),
            sql_literal(table),
        );
        query_columns(conn, &sql)
    }

    /// Square-bracket quoting, the T-SQL house style.
    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    // The default `cursor_for_database` issues `USE [db]`, which is exactly
    // the SQL Server behavior.
}

/// Azure SQL is SQL Server with isolation restrictions: no `USE`, no
/// cross-database browsing. Every connection is pinned to its configured
/// database.
pub struct AzureSqlAdapter {
    inner: SqlServerAdapter,
}

impl AzureSqlAdapter {
    pub fn new() -> Self {
        Self {
            inner: SqlServerAdapter {
                db_type: "azuresql",
                display_name: "Azure SQL",
            },
        }
    }
}

impl Default for AzureSqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for AzureSqlAdapter {
    fn db_type(&self) -> &str {
        self.inner.db_type
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        self.inner.connect(config)
    }

    fn list_databases(&self, _conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        // Each Azure SQL database is isolated; only the connected one is
        // visible.
        Ok(Vec::new())
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        self.inner.list_tables(conn, database)
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        self.inner.list_views(conn, database)
    }

    fn list_procedures(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        self.inner.list_procedures(conn, database)
    }

    fn list_triggers(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        self.inner.list_triggers(conn, database)
    }

    fn list_sequences(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        self.inner.list_sequences(conn, database)
    }

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        self.inner.list_columns(conn, database, schema, table)
    }

    /// Azure SQL forbids `USE`; the cursor stays bound to the connected
    /// database no matter what was asked for.
    fn cursor_for_database(
        &self,
        conn: &dyn DriverConnection,
        _config: &ConnectionConfig,
        _database: Option<&str>,
    ) -> Result<DatabaseCursor, DbError> {
        Ok(DatabaseCursor::Current(conn.cursor()?))
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.inner.quote_identifier(name)
    }

    fn supports_multiple_databases(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_quoting() {
        let adapter = SqlServerAdapter::new();
        assert_eq!(adapter.quote_identifier("Order Details"), "[Order Details]");
        assert_eq!(adapter.quote_identifier("we]ird"), "[we]]ird]");
    }

    #[test]
    fn azure_disables_multi_database() {
        let adapter = AzureSqlAdapter::new();
        assert!(!adapter.supports_multiple_databases());
        assert!(SqlServerAdapter::new().supports_multiple_databases());
    }

    #[test]
    fn missing_driver_carries_install_hint() {
        let adapter = SqlServerAdapter::new();
        let config = ConnectionConfig::new(
            "mssql",
            "mssql",
            squill_core::Endpoint::tcp("localhost", 1433),
        );
        let err = adapter.connect(&config).unwrap_err();
        match err {
            DbError::MissingDriver(missing) => {
                assert_eq!(missing.driver, "SQL Server");
                assert!(missing.install_hint().contains("tiberius"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
