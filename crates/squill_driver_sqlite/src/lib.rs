//! Thin rusqlite shim: adapts a SQLite database file to the squill cursor
//! contract.

use rusqlite::{Connection as RusqliteConnection, InterruptHandle};
use squill_core::{
    ColumnMeta, ConnectionConfig, Cursor, DbError, DriverConnection, Endpoint, Row, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Open a SQLite database from a file-shaped config.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
    let Endpoint::File { path } = &config.endpoint else {
        return Err(DbError::invalid_config(
            "SQLite connections require a file path",
        ));
    };

    let conn = RusqliteConnection::open(path)
        .map_err(|e| DbError::connection_refused(e.to_string()))?;
    let interrupt = conn.get_interrupt_handle();

    Ok(Box::new(SqliteConnection {
        conn: Arc::new(Mutex::new(Some(conn))),
        interrupt,
    }))
}

struct SqliteConnection {
    conn: Arc<Mutex<Option<RusqliteConnection>>>,
    interrupt: InterruptHandle,
}

impl DriverConnection for SqliteConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor>, DbError> {
        Ok(Box::new(SqliteCursor {
            conn: self.conn.clone(),
            rows: VecDeque::new(),
            columns: None,
            affected: None,
        }))
    }

    fn interrupt(&self) -> Result<(), DbError> {
        self.interrupt.interrupt();
        Ok(())
    }

    fn close(&self) {
        // Dropping the handle aborts a blocked statement together with the
        // interrupt above.
        self.interrupt.interrupt();
        self.conn.lock().expect("sqlite conn poisoned").take();
    }
}

struct SqliteCursor {
    conn: Arc<Mutex<Option<RusqliteConnection>>>,
    rows: VecDeque<Row>,
    columns: Option<Vec<ColumnMeta>>,
    affected: Option<u64>,
}

impl Cursor for SqliteCursor {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        let guard = self.conn.lock().expect("sqlite conn poisoned");
        let conn = guard
            .as_ref()
            .ok_or_else(|| DbError::query_failed("connection closed"))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| map_sqlite_error(conn, &e))?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute([]).map_err(|e| map_sqlite_error(conn, &e))?;
            self.columns = None;
            self.rows.clear();
            self.affected = Some(affected as u64);
            return Ok(());
        }

        let columns: Vec<ColumnMeta> = stmt
            .column_names()
            .iter()
            .map(|name| ColumnMeta::new(*name))
            .collect();
        let column_count = columns.len();

        // rusqlite rows cannot outlive their statement; buffer them here
        // and let `fetch_many` drain the buffer.
        let mut buffered = VecDeque::new();
        let mut rows = stmt.query([]).map_err(|e| map_sqlite_error(conn, &e))?;
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        values.push(column_value(row, i));
                    }
                    buffered.push_back(values);
                }
                Ok(None) => break,
                Err(e) => return Err(map_sqlite_error(conn, &e)),
            }
        }

        self.columns = Some(columns);
        self.rows = buffered;
        self.affected = None;
        Ok(())
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, DbError> {
        let take = size.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    fn description(&self) -> Option<Vec<ColumnMeta>> {
        self.columns.clone()
    }

    fn rows_affected(&self) -> Option<u64> {
        self.affected
    }
}

fn column_value(row: &rusqlite::Row<'_>, idx: usize) -> Value {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Integer(i)) => Value::Int(i),
        Ok(ValueRef::Real(f)) => Value::Float(f),
        Ok(ValueRef::Text(bytes)) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Text(hex::encode(bytes)),
        },
        Ok(ValueRef::Blob(bytes)) => Value::Bytes(bytes.to_vec()),
        Err(e) => {
            log::warn!("sqlite: unreadable column {}: {}", idx, e);
            Value::Null
        }
    }
}

fn map_sqlite_error(conn: &RusqliteConnection, e: &rusqlite::Error) -> DbError {
    if conn.is_busy() {
        return DbError::query_failed(format!("database is locked: {}", e));
    }
    DbError::query_failed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(path: &std::path::Path) -> ConnectionConfig {
        ConnectionConfig::new(
            "test-sqlite",
            "sqlite",
            Endpoint::File {
                path: path.to_path_buf(),
            },
        )
    }

    #[test]
    fn execute_and_fetch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&file_config(&dir.path().join("t.db"))).unwrap();

        let mut cursor = conn.cursor().unwrap();
        cursor
            .execute("CREATE TABLE t (id INTEGER, name TEXT)")
            .unwrap();
        assert!(cursor.description().is_none());

        cursor
            .execute("INSERT INTO t VALUES (1, 'a'), (2, 'b')")
            .unwrap();
        assert_eq!(cursor.rows_affected(), Some(2));

        cursor.execute("SELECT id, name FROM t ORDER BY id").unwrap();
        let columns = cursor.description().unwrap();
        assert_eq!(columns[0].name, "id");

        let rows = cursor.fetch_many(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Value::Int(1));
        assert_eq!(rows[1][1], Value::Text("b".into()));

        // Exhausted.
        assert!(cursor.fetch_many(10).unwrap().is_empty());
    }

    #[test]
    fn fetch_many_respects_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&file_config(&dir.path().join("t.db"))).unwrap();

        let mut cursor = conn.cursor().unwrap();
        cursor.execute("CREATE TABLE n (v INTEGER)").unwrap();
        cursor
            .execute("INSERT INTO n VALUES (1), (2), (3), (4), (5)")
            .unwrap();

        cursor.execute("SELECT v FROM n").unwrap();
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 2);
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 2);
        assert_eq!(cursor.fetch_many(2).unwrap().len(), 1);
    }

    #[test]
    fn closed_connection_rejects_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&file_config(&dir.path().join("t.db"))).unwrap();

        let mut cursor = conn.cursor().unwrap();
        conn.close();
        assert!(cursor.execute("SELECT 1").is_err());
    }

    #[test]
    fn syntax_error_is_query_failed() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&file_config(&dir.path().join("t.db"))).unwrap();

        let mut cursor = conn.cursor().unwrap();
        let err = cursor.execute("SELEKT 1").unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
