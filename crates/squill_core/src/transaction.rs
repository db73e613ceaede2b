use crate::{
    Adapter, ColumnMeta, ConnectionConfig, DbError, DriverConnection, NonQueryResult, QueryResult,
    StatementOutcome, sql,
    sql::TransactionSentinel,
};
use log::{debug, warn};
use std::sync::Arc;

/// Executes statements on a persistent connection so transactions keep their
/// affinity.
///
/// The executor owns one sticky connection per `ConnectionConfig`; a config
/// change (including a database override) or a disconnect resets it. While
/// `in_transaction`, every statement must run here; the query pipeline
/// refuses to route such statements to the process worker.
///
/// Callers serialize access through a mutex; at most one `execute` or
/// `atomic_execute` is active at a time.
pub struct TransactionExecutor {
    adapter: Arc<dyn Adapter>,
    config: ConnectionConfig,
    conn: Option<Arc<dyn DriverConnection>>,
    in_transaction: bool,
}

impl TransactionExecutor {
    pub fn new(adapter: Arc<dyn Adapter>, config: ConnectionConfig) -> Self {
        Self {
            adapter,
            config,
            conn: None,
            in_transaction: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Point the executor at a different config, dropping the sticky
    /// connection. No-op when the config is unchanged.
    pub fn set_config(&mut self, config: ConnectionConfig) {
        if self.config != config {
            debug!("transaction executor reset: config changed");
            self.reset();
            self.config = config;
        }
    }

    /// Drop the sticky connection and leave transaction mode.
    pub fn reset(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
        self.in_transaction = false;
    }

    /// Stable identity of the sticky connection, for affinity checks.
    pub fn connection_token(&self) -> Option<usize> {
        self.conn
            .as_ref()
            .map(|c| Arc::as_ptr(c) as *const () as usize)
    }

    /// Run one statement on the sticky connection.
    ///
    /// Transaction sentinels (`BEGIN`/`START TRANSACTION`, `COMMIT`/`END`,
    /// `ROLLBACK`) flip transaction mode after they succeed.
    pub fn execute(
        &mut self,
        statement: &str,
        max_rows: Option<usize>,
    ) -> Result<StatementOutcome, DbError> {
        let sentinel = sql::transaction_sentinel(statement);
        let outcome = self.run(statement, max_rows)?;

        match sentinel {
            Some(TransactionSentinel::Begin) => self.in_transaction = true,
            Some(TransactionSentinel::Commit) | Some(TransactionSentinel::Rollback) => {
                self.in_transaction = false;
            }
            None => {}
        }

        Ok(outcome)
    }

    /// Run a script as one atomic unit: `BEGIN`, the script, `COMMIT`.
    ///
    /// On any error the connection is rolled back (best effort) and the
    /// original error re-raised. The script runs as a single statement; its
    /// partial results are not surfaced.
    pub fn atomic_execute(
        &mut self,
        script: &str,
        max_rows: Option<usize>,
    ) -> Result<StatementOutcome, DbError> {
        self.run("BEGIN", None)?;
        self.in_transaction = true;

        let result = self.run(script, max_rows);

        match result {
            Ok(outcome) => {
                self.run("COMMIT", None)?;
                self.in_transaction = false;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = self.run("ROLLBACK", None) {
                    warn!("rollback after failed atomic execute: {}", rollback_err);
                }
                self.in_transaction = false;
                Err(e)
            }
        }
    }

    fn run(&mut self, statement: &str, max_rows: Option<usize>) -> Result<StatementOutcome, DbError> {
        let conn = self.ensure_connection()?;

        let mut cursor = match conn.cursor() {
            Ok(c) => c,
            Err(e) => {
                // The sticky connection died; a fresh one gets one retry
                // unless a transaction is pinned to the old connection.
                if self.in_transaction {
                    return Err(e);
                }
                self.reset();
                self.ensure_connection()?.cursor()?
            }
        };

        cursor.execute(statement)?;

        let outcome = match cursor.description() {
            Some(columns) => {
                let (rows, truncated) = match max_rows {
                    Some(cap) => {
                        let mut rows = cursor.fetch_many(cap + 1)?;
                        let truncated = rows.len() > cap;
                        rows.truncate(cap);
                        (rows, truncated)
                    }
                    None => {
                        let mut rows = Vec::new();
                        loop {
                            let batch = cursor.fetch_many(512)?;
                            if batch.is_empty() {
                                break;
                            }
                            rows.extend(batch);
                        }
                        (rows, false)
                    }
                };
                let row_count = rows.len();
                StatementOutcome::Query(QueryResult {
                    columns: if columns.is_empty() {
                        synthesized_columns(&rows)
                    } else {
                        columns
                    },
                    rows,
                    row_count,
                    truncated,
                })
            }
            None => StatementOutcome::NonQuery(NonQueryResult {
                rows_affected: cursor.rows_affected().unwrap_or(0),
            }),
        };

        cursor.close();
        Ok(outcome)
    }

    fn ensure_connection(&mut self) -> Result<Arc<dyn DriverConnection>, DbError> {
        if let Some(conn) = &self.conn {
            return Ok(conn.clone());
        }

        let conn: Arc<dyn DriverConnection> = Arc::from(self.adapter.connect(&self.config)?);
        self.conn = Some(conn.clone());
        Ok(conn)
    }
}

impl Drop for TransactionExecutor {
    fn drop(&mut self) {
        self.reset();
    }
}

fn synthesized_columns(rows: &[crate::Row]) -> Vec<ColumnMeta> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    (0..width)
        .map(|i| ColumnMeta::new(format!("column{}", i + 1)))
        .collect()
}
