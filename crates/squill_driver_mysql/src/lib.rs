//! Thin mysql shim: adapts `mysql::Conn` to the squill cursor contract.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use squill_core::{
    CONNECT_TIMEOUT, ColumnMeta, ConnectionConfig, Cursor, DbError, DriverConnection, Endpoint,
    Row, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Connect to a MySQL/MariaDB server.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
    let Endpoint::Tcp {
        host,
        port,
        database,
        username,
        password,
    } = &config.endpoint
    else {
        return Err(DbError::invalid_config(
            "MySQL connections require a TCP endpoint",
        ));
    };

    let opts: Opts = OptsBuilder::new()
        .ip_or_hostname(Some(host.clone()))
        .tcp_port(port.unwrap_or(3306))
        .user(username.clone())
        .pass(password.clone())
        .db_name(database.clone())
        .tcp_connect_timeout(Some(CONNECT_TIMEOUT))
        .into();

    let conn = Conn::new(opts.clone()).map_err(map_connect_error)?;
    let thread_id = conn.connection_id();

    Ok(Box::new(MysqlConnection {
        conn: Arc::new(Mutex::new(Some(conn))),
        opts,
        thread_id,
    }))
}

fn map_connect_error(e: mysql::Error) -> DbError {
    if let mysql::Error::MySqlError(server_error) = &e {
        // 1045: access denied.
        if server_error.code == 1045 {
            return DbError::auth_failed(server_error.message.clone());
        }
    }
    DbError::connection_refused(e.to_string())
}

struct MysqlConnection {
    conn: Arc<Mutex<Option<Conn>>>,
    opts: Opts,
    thread_id: u32,
}

impl DriverConnection for MysqlConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor>, DbError> {
        Ok(Box::new(MysqlCursor {
            conn: self.conn.clone(),
            rows: VecDeque::new(),
            columns: None,
            affected: None,
        }))
    }

    fn interrupt(&self) -> Result<(), DbError> {
        // The server kills the running statement from a second connection.
        let mut side = Conn::new(self.opts.clone())
            .map_err(|e| DbError::query_failed(format!("cancel connection failed: {}", e)))?;
        side.query_drop(format!("KILL QUERY {}", self.thread_id))
            .map_err(|e| DbError::query_failed(format!("cancel failed: {}", e)))?;
        Ok(())
    }

    fn close(&self) {
        if self.interrupt().is_err() {
            log::debug!("mysql: no in-flight statement to kill");
        }
        if let Ok(mut guard) = self.conn.try_lock() {
            guard.take();
        }
    }
}

struct MysqlCursor {
    conn: Arc<Mutex<Option<Conn>>>,
    rows: VecDeque<Row>,
    columns: Option<Vec<ColumnMeta>>,
    affected: Option<u64>,
}

impl Cursor for MysqlCursor {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        let mut guard = self.conn.lock().expect("mysql conn poisoned");
        let conn = guard
            .as_mut()
            .ok_or_else(|| DbError::query_failed("connection closed"))?;

        let mut result = conn
            .query_iter(sql)
            .map_err(|e| DbError::query_failed(e.to_string()))?;

        let Some(result_set) = result.iter() else {
            self.columns = None;
            self.rows.clear();
            self.affected = Some(result.affected_rows());
            return Ok(());
        };

        let columns: Vec<ColumnMeta> = result_set
            .columns()
            .as_ref()
            .iter()
            .map(|c| ColumnMeta::new(c.name_str().to_string()))
            .collect();

        if columns.is_empty() {
            drop(result_set);
            self.columns = None;
            self.rows.clear();
            self.affected = Some(result.affected_rows());
            return Ok(());
        }

        let mut rows = VecDeque::new();
        for row in result_set {
            let row = row.map_err(|e| DbError::query_failed(e.to_string()))?;
            rows.push_back(convert_row(row));
        }

        self.columns = Some(columns);
        self.rows = rows;
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

fn convert_row(row: mysql::Row) -> Row {
    (0..row.len())
        .map(|i| match row.as_ref(i) {
            Some(value) => convert_value(value),
            None => Value::Null,
        })
        .collect()
}

fn convert_value(value: &mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::Int(*i),
        mysql::Value::UInt(u) => {
            if *u <= i64::MAX as u64 {
                Value::Int(*u as i64)
            } else {
                Value::Decimal(u.to_string())
            }
        }
        mysql::Value::Float(f) => Value::Float(*f as f64),
        mysql::Value::Double(f) => Value::Float(*f),
        mysql::Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(bytes.clone()),
        },
        other => Value::Text(
            other
                .as_sql(false)
                .trim_matches('\'')
                .to_string(),
        ),
    }
}
