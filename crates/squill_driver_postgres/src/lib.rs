//! Thin postgres shim: adapts the synchronous `postgres` client to the
//! squill cursor contract. Also serves the wire-compatible family
//! (CockroachDB, Redshift, Supabase).
//!
//! Queries go through the simple-query protocol, so values arrive as text;
//! the shim forwards them as text values rather than guessing types.

use postgres::{Client, SimpleQueryMessage};
use squill_core::{
    CONNECT_TIMEOUT, ColumnMeta, ConnectionConfig, Cursor, DbError, DriverConnection, Endpoint,
    Row, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Connect to a PostgreSQL-protocol server.
pub fn connect(
    config: &ConnectionConfig,
    default_database: &str,
) -> Result<Box<dyn DriverConnection>, DbError> {
    let Endpoint::Tcp {
        host,
        port,
        database,
        username,
        password,
    } = &config.endpoint
    else {
        return Err(DbError::invalid_config(
            "PostgreSQL connections require a TCP endpoint",
        ));
    };

    let mut pg_config = postgres::Config::new();
    pg_config
        .host(host)
        .port(port.unwrap_or(5432))
        .dbname(database.as_deref().unwrap_or(default_database))
        .user(username.as_deref().unwrap_or("postgres"))
        .connect_timeout(CONNECT_TIMEOUT);

    if let Some(password) = password {
        pg_config.password(password);
    }

    let client = match config.options.get("sslmode").map(String::as_str) {
        Some("require") | Some("prefer") => {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(
                    config.options.get("sslaccept").map(String::as_str) == Some("invalid"),
                )
                .build()
                .map_err(|e| DbError::connection_refused(format!("TLS setup failed: {}", e)))?;
            pg_config
                .connect(postgres_native_tls::MakeTlsConnector::new(connector))
                .map_err(map_connect_error)?
        }
        _ => pg_config
            .connect(postgres::NoTls)
            .map_err(map_connect_error)?,
    };

    let cancel_token = client.cancel_token();

    Ok(Box::new(PostgresConnection {
        client: Arc::new(Mutex::new(Some(client))),
        cancel_token,
    }))
}

fn map_connect_error(e: postgres::Error) -> DbError {
    let message = e.to_string();
    if let Some(db_error) = e.as_db_error() {
        // 28xxx SQLSTATE class is authentication.
        if db_error.code().code().starts_with("28") {
            return DbError::auth_failed(db_error.message().to_string());
        }
        return DbError::connection_refused(db_error.message().to_string());
    }
    DbError::connection_refused(message)
}

struct PostgresConnection {
    client: Arc<Mutex<Option<Client>>>,
    cancel_token: postgres::CancelToken,
}

impl DriverConnection for PostgresConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor>, DbError> {
        Ok(Box::new(PostgresCursor {
            client: self.client.clone(),
            rows: VecDeque::new(),
            columns: None,
            affected: None,
        }))
    }

    fn interrupt(&self) -> Result<(), DbError> {
        self.cancel_token
            .cancel_query(postgres::NoTls)
            .map_err(|e| DbError::query_failed(format!("cancel request failed: {}", e)))
    }

    fn close(&self) {
        // Unblock any in-flight statement first, then drop the client. A
        // blocked executor holds the mutex, so closing is best-effort; the
        // cancel guarantees the lock frees promptly.
        let _ = self.cancel_token.cancel_query(postgres::NoTls);
        if let Ok(mut guard) = self.client.try_lock() {
            guard.take();
        }
    }
}

struct PostgresCursor {
    client: Arc<Mutex<Option<Client>>>,
    rows: VecDeque<Row>,
    columns: Option<Vec<ColumnMeta>>,
    affected: Option<u64>,
}

impl Cursor for PostgresCursor {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        let mut guard = self.client.lock().expect("postgres client poisoned");
        let client = guard
            .as_mut()
            .ok_or_else(|| DbError::query_failed("connection closed"))?;

        let messages = client
            .simple_query(sql)
            .map_err(|e| DbError::query_failed(e.to_string()))?;

        let mut columns: Option<Vec<ColumnMeta>> = None;
        let mut rows = VecDeque::new();
        let mut affected = None;

        for message in messages {
            match message {
                // Zero-row results still need headers.
                SimpleQueryMessage::RowDescription(description) => {
                    columns = Some(
                        description
                            .iter()
                            .map(|c| ColumnMeta::new(c.name()))
                            .collect(),
                    );
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_none() {
                        columns = Some(
                            row.columns()
                                .iter()
                                .map(|c| ColumnMeta::new(c.name()))
                                .collect(),
                        );
                    }
                    let values: Row = (0..row.len())
                        .map(|i| match row.get(i) {
                            Some(text) => Value::Text(text.to_string()),
                            None => Value::Null,
                        })
                        .collect();
                    rows.push_back(values);
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    if affected.is_none() {
                        affected = Some(count);
                    }
                }
                _ => {}
            }
        }

        if columns.is_some() {
            self.columns = columns;
            self.rows = rows;
            self.affected = None;
        } else {
            self.columns = None;
            self.rows.clear();
            self.affected = affected;
        }

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
