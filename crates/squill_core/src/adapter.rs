use crate::{ColumnMeta, ConnectionConfig, DbError, Row, sql};

/// A driver-scoped execution handle.
///
/// This is the small capability surface every driver shim adapts its native
/// connection to: execute a statement, drain rows in batches, report result
/// shape. Executors and adapters never see driver types directly.
pub trait Cursor: Send {
    /// Execute a single statement, leaving the cursor positioned on its
    /// result (if any).
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Fetch up to `size` rows from the current result.
    ///
    /// Returns an empty vector once the result is exhausted, and always for
    /// non-row-returning statements.
    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, DbError>;

    /// Column metadata of the current result; `None` for statements that
    /// return no rows.
    fn description(&self) -> Option<Vec<ColumnMeta>>;

    /// Rows affected by the last statement, when the driver reports it.
    fn rows_affected(&self) -> Option<u64>;

    /// Release the cursor. Dropping has the same effect.
    fn close(&mut self) {}
}

/// A live driver connection.
///
/// Implementations are interior-mutable and thread-safe: `interrupt` and
/// `close` must be callable from another thread while a cursor produced by
/// this connection is blocked mid-execute.
pub trait DriverConnection: Send + Sync {
    /// Open a cursor on this connection.
    fn cursor(&self) -> Result<Box<dyn Cursor>, DbError>;

    /// Driver-native cancellation of the in-flight statement, when the
    /// backend supports one (pg_cancel_backend, sqlite3_interrupt).
    fn interrupt(&self) -> Result<(), DbError> {
        Err(DbError::query_failed(
            "Query cancellation not supported by this driver",
        ))
    }

    /// Forcibly close the underlying connection.
    ///
    /// Idempotent; callable from any thread; interrupts a blocked execute
    /// where the driver allows it.
    fn close(&self);
}

impl std::fmt::Debug for dyn DriverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DriverConnection")
    }
}

/// A cursor scoped to a target database.
///
/// Some backends switch databases on the existing connection (`USE`), others
/// need a second connection; this keeps the owning connection alive either
/// way.
pub enum DatabaseCursor {
    /// Cursor on the session's existing connection.
    Current(Box<dyn Cursor>),
    /// Cursor on a dedicated connection opened for the target database.
    Dedicated {
        conn: Box<dyn DriverConnection>,
        cursor: Box<dyn Cursor>,
    },
}

impl DatabaseCursor {
    pub fn cursor_mut(&mut self) -> &mut dyn Cursor {
        match self {
            DatabaseCursor::Current(c) => c.as_mut(),
            DatabaseCursor::Dedicated { cursor, .. } => cursor.as_mut(),
        }
    }

    pub fn close(&mut self) {
        match self {
            DatabaseCursor::Current(c) => c.close(),
            DatabaseCursor::Dedicated { conn, cursor } => {
                cursor.close();
                conn.close();
            }
        }
    }
}

/// A schema object reference (tables, views, procedures, ...).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectRef {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(schema: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(Into::into),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

/// Per-dialect capability contract.
///
/// Adapters are stateless strategies: no shared mutable state between calls,
/// all connection state lives in the handles they return. One adapter
/// instance serves every session of its `db_type`.
pub trait Adapter: Send + Sync {
    /// The provider key this adapter serves.
    fn db_type(&self) -> &str;

    /// Open a connection for the given config.
    ///
    /// Fails with `MissingDriver` when the backing driver shim is not
    /// compiled in, `ConnectionRefused` on network errors, and `AuthFailed`
    /// on credential rejection.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError>;

    /// List databases on the server. Empty for single-database backends.
    fn list_databases(&self, _conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        Ok(Vec::new())
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError>;

    fn list_views(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        Ok(Vec::new())
    }

    fn list_procedures(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        Ok(Vec::new())
    }

    fn list_triggers(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        Ok(Vec::new())
    }

    fn list_sequences(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        Ok(Vec::new())
    }

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError>;

    /// Get a cursor scoped to `database`.
    ///
    /// The default issues `USE <database>` on a fresh cursor when a switch is
    /// requested, which fits backends with cheap in-connection switching
    /// (MySQL, SQL Server). Backends that cannot switch return the current
    /// cursor; backends that need a second connection override and connect
    /// with `apply_database_override`.
    fn cursor_for_database(
        &self,
        conn: &dyn DriverConnection,
        _config: &ConnectionConfig,
        database: Option<&str>,
    ) -> Result<DatabaseCursor, DbError> {
        let mut cursor = conn.cursor()?;
        if let Some(db) = database {
            cursor.execute(&format!("USE {}", self.quote_identifier(db)))?;
        }
        Ok(DatabaseCursor::Current(cursor))
    }

    /// A config pointing at a different database on the same server.
    fn apply_database_override(
        &self,
        config: &ConnectionConfig,
        database: &str,
    ) -> ConnectionConfig {
        config.with_database(database)
    }

    /// Dialect identifier quoting. Double quotes by default; MySQL overrides
    /// with backticks, SQL Server with square brackets.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Split a script into statements (naive walker, see `sql`).
    fn split_statements(&self, script: &str) -> Vec<String> {
        sql::split_statements(script)
    }

    fn supports_stored_procedures(&self) -> bool {
        true
    }

    fn supports_triggers(&self) -> bool {
        true
    }

    fn supports_multiple_databases(&self) -> bool {
        true
    }
}
