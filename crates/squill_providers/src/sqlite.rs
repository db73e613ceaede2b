use crate::util::{query_columns, query_objects};
use squill_core::{
    Adapter, ColumnInfo, ConnectionConfig, DatabaseCursor, DbError, DriverConnection, MissingDriver,
    ObjectRef,
};

/// SQLite adapter: one database per file, objects listed from
/// `sqlite_master`, columns from `PRAGMA table_info`.
pub struct SqliteAdapter;

impl SqliteAdapter {
    pub fn new() -> Self {
        Self
    }

    #[allow(dead_code)]
    fn missing_driver(&self) -> DbError {
        DbError::MissingDriver(MissingDriver::new("SQLite", "sqlite", "rusqlite"))
    }
}

impl Default for SqliteAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for SqliteAdapter {
    fn db_type(&self) -> &str {
        "sqlite"
    }

    #[cfg(feature = "sqlite")]
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        squill_driver_sqlite::connect(config)
    }

    #[cfg(not(feature = "sqlite"))]
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        Err(self.missing_driver())
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT name FROM sqlite_master WHERE type = 'view' ORDER BY name",
        )
    }

    fn list_triggers(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT name FROM sqlite_master WHERE type = 'trigger' ORDER BY name",
        )
    }

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        // PRAGMA table_info columns: cid, name, type, notnull, dflt_value,
        // pk. Reorder through a wrapper select so the shared collector can
        // read (name, type, nullable, pk).
        let sql = format!(
            "SELECT name, type, NOT \"notnull\", pk FROM pragma_table_info({})",
            crate::util::sql_literal(table),
        );
        query_columns(conn, &sql)
    }

    /// One database per file: the cursor is always on the current database.
    fn cursor_for_database(
        &self,
        conn: &dyn DriverConnection,
        _config: &ConnectionConfig,
        _database: Option<&str>,
    ) -> Result<DatabaseCursor, DbError> {
        Ok(DatabaseCursor::Current(conn.cursor()?))
    }

    fn supports_stored_procedures(&self) -> bool {
        false
    }

    fn supports_multiple_databases(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use squill_core::Endpoint;

    fn open(dir: &tempfile::TempDir) -> Box<dyn DriverConnection> {
        let config = ConnectionConfig::new(
            "t",
            "sqlite",
            Endpoint::File {
                path: dir.path().join("t.db"),
            },
        );
        SqliteAdapter::new().connect(&config).unwrap()
    }

    #[test]
    fn lists_tables_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&dir);

        let mut cursor = conn.cursor().unwrap();
        cursor
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        cursor.execute("CREATE VIEW v AS SELECT id FROM users").unwrap();

        let adapter = SqliteAdapter::new();
        let tables = adapter.list_tables(conn.as_ref(), None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
        assert!(tables[0].schema.is_none());

        let views = adapter.list_views(conn.as_ref(), None).unwrap();
        assert_eq!(views[0].name, "v");

        let columns = adapter
            .list_columns(conn.as_ref(), None, None, "users")
            .unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert!(columns[0].is_primary_key);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn database_scoped_cursor_is_always_current() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&dir);
        let adapter = SqliteAdapter::new();
        let config = ConnectionConfig::new(
            "t",
            "sqlite",
            Endpoint::File {
                path: dir.path().join("t.db"),
            },
        );

        let cursor = adapter
            .cursor_for_database(conn.as_ref(), &config, Some("other"))
            .unwrap();
        assert!(matches!(cursor, DatabaseCursor::Current(_)));
    }
}
