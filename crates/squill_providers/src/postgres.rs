use crate::util::{query_columns, query_objects, query_strings, sql_literal};
use squill_core::{
    Adapter, ColumnInfo, ConnectionConfig, DatabaseCursor, DbError, DriverConnection, MissingDriver,
    ObjectRef,
};

/// Adapter for the PostgreSQL wire family: PostgreSQL itself plus
/// CockroachDB, Redshift, and Supabase, which speak the same protocol with
/// different capability surfaces.
pub struct PostgresAdapter {
    db_type: &'static str,
    display_name: &'static str,
    default_database: &'static str,
    databases_sql: &'static str,
    procedures: bool,
    triggers: bool,
}

impl PostgresAdapter {
    pub fn postgresql() -> Self {
        Self {
            db_type: "postgresql",
            display_name: "PostgreSQL",
            default_database: "postgres",
            databases_sql:
                "SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname",
            procedures: true,
            triggers: true,
        }
    }

    /// CockroachDB rejects stored procedures and ships triggers only as a
    /// preview; both stay off.
    pub fn cockroachdb() -> Self {
        Self {
            db_type: "cockroachdb",
            display_name: "CockroachDB",
            default_database: "defaultdb",
            databases_sql: "SELECT database_name FROM [SHOW DATABASES] ORDER BY database_name",
            procedures: false,
            triggers: false,
        }
    }

    pub fn redshift() -> Self {
        Self {
            db_type: "redshift",
            display_name: "Redshift",
            default_database: "dev",
            databases_sql:
                "SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname",
            procedures: true,
            triggers: false,
        }
    }

    pub fn supabase() -> Self {
        Self {
            db_type: "supabase",
            display_name: "Supabase",
            default_database: "postgres",
            databases_sql:
                "SELECT datname FROM pg_database WHERE datistemplate = false ORDER BY datname",
            procedures: true,
            triggers: true,
        }
    }

    #[allow(dead_code)]
    fn missing_driver(&self) -> DbError {
        DbError::MissingDriver(MissingDriver::new(self.display_name, "postgres", "postgres"))
    }
}

impl Adapter for PostgresAdapter {
    fn db_type(&self) -> &str {
        self.db_type
    }

    #[cfg(feature = "postgres")]
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        squill_driver_postgres::connect(config, self.default_database)
    }

    #[cfg(not(feature = "postgres"))]
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        Err(self.missing_driver())
    }

    fn list_databases(&self, conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        query_strings(conn, self.databases_sql)
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
             AND table_schema NOT IN ('pg_catalog', 'information_schema', 'crdb_internal') \
             ORDER BY table_schema, table_name",
        )
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT table_schema, table_name FROM information_schema.views \
             WHERE table_schema NOT IN ('pg_catalog', 'information_schema', 'crdb_internal') \
             ORDER BY table_schema, table_name",
        )
    }

    fn list_procedures(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        if !self.procedures {
            return Ok(Vec::new());
        }
        query_objects(
            conn,
            "SELECT routine_schema, routine_name FROM information_schema.routines \
             WHERE routine_schema = 'public' AND routine_type = 'FUNCTION' \
             ORDER BY routine_name",
        )
    }

    fn list_triggers(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        if !self.triggers {
            return Ok(Vec::new());
        }
        query_objects(
            conn,
            "SELECT trigger_schema, trigger_name FROM information_schema.triggers \
             ORDER BY trigger_name",
        )
    }

    fn list_sequences(
        &self,
        conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        query_objects(
            conn,
            "SELECT sequence_schema, sequence_name FROM information_schema.sequences \
             ORDER BY sequence_name",
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
            "SELECT column_name, data_type, is_nullable, 'false' \
             FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} \
             ORDER BY ordinal_position",
            sql_literal(schema.unwrap_or("public")),
            sql_literal(table),
        );
        query_columns(conn, &sql)
    }

    /// Each PostgreSQL database needs its own backend connection; there is
    /// no in-session switch.
    fn cursor_for_database(
        &self,
        conn: &dyn DriverConnection,
        config: &ConnectionConfig,
        database: Option<&str>,
    ) -> Result<DatabaseCursor, DbError> {
        match database {
            Some(db) if Some(db) != config.endpoint.database() => {
                let dedicated = self.connect(&self.apply_database_override(config, db))?;
                let cursor = dedicated.cursor()?;
                Ok(DatabaseCursor::Dedicated {
                    conn: dedicated,
                    cursor,
                })
            }
            _ => Ok(DatabaseCursor::Current(conn.cursor()?)),
        }
    }

    fn supports_stored_procedures(&self) -> bool {
        self.procedures
    }

    fn supports_triggers(&self) -> bool {
        self.triggers
    }
}
