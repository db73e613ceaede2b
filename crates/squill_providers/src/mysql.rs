use crate::util::{query_columns, query_objects, query_strings, sql_literal};
use squill_core::{
    Adapter, ColumnInfo, ConnectionConfig, DbError, DriverConnection, MissingDriver, ObjectRef,
};

/// MySQL adapter: backtick quoting, `USE` database switching, metadata via
/// `information_schema` scoped to the schema (which MySQL calls a
/// database).
pub struct MySqlAdapter;

impl MySqlAdapter {
    pub fn new() -> Self {
        Self
    }

    #[allow(dead_code)]
    fn missing_driver(&self) -> DbError {
        DbError::MissingDriver(MissingDriver::new("MySQL", "mysql", "mysql"))
    }

    fn schema_filter(&self, database: Option<&str>) -> String {
        match database {
            Some(db) => sql_literal(db),
            None => "DATABASE()".to_string(),
        }
    }
}

impl Default for MySqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for MySqlAdapter {
    fn db_type(&self) -> &str {
        "mysql"
    }

    #[cfg(feature = "mysql")]
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        squill_driver_mysql::connect(config)
    }

    #[cfg(not(feature = "mysql"))]
    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        Err(self.missing_driver())
    }

    fn list_databases(&self, conn: &dyn DriverConnection) -> Result<Vec<String>, DbError> {
        query_strings(conn, "SHOW DATABASES")
    }

    fn list_tables(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        let sql = format!(
            "SELECT NULL, table_name FROM information_schema.tables \
             WHERE table_schema = {} AND table_type = 'BASE TABLE' ORDER BY table_name",
            self.schema_filter(database),
        );
        query_objects(conn, &sql)
    }

    fn list_views(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        let sql = format!(
            "SELECT NULL, table_name FROM information_schema.views \
             WHERE table_schema = {} ORDER BY table_name",
            self.schema_filter(database),
        );
        query_objects(conn, &sql)
    }

    fn list_procedures(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        let sql = format!(
            "SELECT NULL, routine_name FROM information_schema.routines \
             WHERE routine_schema = {} ORDER BY routine_name",
            self.schema_filter(database),
        );
        query_objects(conn, &sql)
    }

    fn list_triggers(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        let sql = format!(
            "SELECT NULL, trigger_name FROM information_schema.triggers \
             WHERE trigger_schema = {} ORDER BY trigger_name",
            self.schema_filter(database),
        );
        query_objects(conn, &sql)
    }

    // MySQL has no sequences; the default empty list stands.

    fn list_columns(
        &self,
        conn: &dyn DriverConnection,
        database: Option<&str>,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        let sql = format!(
            "SELECT column_name, column_type, is_nullable, column_key \
             FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} \
             ORDER BY ordinal_position",
            self.schema_filter(database),
            sql_literal(table),
        );
        query_columns(conn, &sql)
    }

    /// Backticks, the MySQL house style.
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    // The default `cursor_for_database` issues `USE`, which is the cheap
    // in-connection switch MySQL supports.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtick_quoting() {
        let adapter = MySqlAdapter::new();
        assert_eq!(adapter.quote_identifier("my table"), "`my table`");
        assert_eq!(adapter.quote_identifier("we`ird"), "`we``ird`");
    }
}
