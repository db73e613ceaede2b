use crate::{
    Adapter, ColumnMeta, ConnectionConfig, DbError, DriverConnection, NonQueryResult, QueryResult,
    StatementOutcome,
};
use log::debug;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs exactly one statement on a dedicated connection it uniquely owns.
///
/// `cancel` is callable from any thread: it requests a driver-native cancel
/// where one exists, then forcibly closes the connection, which interrupts a
/// blocked `execute`. The connection never outlives the call: it is closed
/// on success, failure, and cancellation alike.
pub struct CancellableQuery {
    sql: String,
    config: ConnectionConfig,
    adapter: Arc<dyn Adapter>,
    conn: Mutex<Option<Arc<dyn DriverConnection>>>,
    cancelled: AtomicBool,
}

impl CancellableQuery {
    pub fn new(sql: impl Into<String>, config: ConnectionConfig, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            sql: sql.into(),
            config,
            adapter,
            conn: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Sticky: once set by `cancel`, stays set.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation from any thread.
    ///
    /// Best-effort native cancel first, then a forced close of the dedicated
    /// connection to unblock the executing thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let conn = self.conn.lock().expect("cancellable conn poisoned").take();
        if let Some(conn) = conn {
            if let Err(e) = conn.interrupt() {
                debug!("native cancel unavailable: {}", e);
            }
            conn.close();
        }
    }

    /// Execute the statement, blocking until completion, cancellation, or
    /// error.
    ///
    /// With `max_rows` set and a row-returning statement, at most
    /// `max_rows + 1` rows are fetched so truncation can be detected without
    /// buffering the full result.
    pub fn execute(&self, max_rows: Option<usize>) -> Result<StatementOutcome, DbError> {
        if self.is_cancelled() {
            return Err(DbError::Cancelled);
        }

        let conn: Arc<dyn DriverConnection> = Arc::from(self.adapter.connect(&self.config)?);
        {
            let mut slot = self.conn.lock().expect("cancellable conn poisoned");
            if self.is_cancelled() {
                conn.close();
                return Err(DbError::Cancelled);
            }
            *slot = Some(conn.clone());
        }

        let result = self.run_on(conn.as_ref(), max_rows);

        // Drop our ownership and close; cancel may already have done both.
        self.conn.lock().expect("cancellable conn poisoned").take();
        conn.close();

        // A cancelled query never surfaces driver errors from teardown.
        if self.is_cancelled() {
            return Err(DbError::Cancelled);
        }

        result
    }

    fn run_on(
        &self,
        conn: &dyn DriverConnection,
        max_rows: Option<usize>,
    ) -> Result<StatementOutcome, DbError> {
        let mut cursor = conn.cursor()?;
        cursor.execute(&self.sql)?;

        let outcome = match cursor.description() {
            Some(columns) => {
                let (rows, truncated) = match max_rows {
                    Some(cap) => {
                        let mut rows = cursor.fetch_many(cap + 1)?;
                        let truncated = rows.len() > cap;
                        rows.truncate(cap);
                        (rows, truncated)
                    }
                    None => (drain(cursor.as_mut())?, false),
                };

                let row_count = rows.len();
                StatementOutcome::Query(QueryResult {
                    columns: normalize_columns(columns, &rows),
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
}

fn drain(cursor: &mut dyn crate::Cursor) -> Result<Vec<crate::Row>, DbError> {
    let mut rows = Vec::new();
    loop {
        let batch = cursor.fetch_many(512)?;
        if batch.is_empty() {
            return Ok(rows);
        }
        rows.extend(batch);
    }
}

fn normalize_columns(columns: Vec<ColumnMeta>, rows: &[crate::Row]) -> Vec<ColumnMeta> {
    if !columns.is_empty() {
        return columns;
    }
    // Drivers that report no description for row-returning statements still
    // need headers for the result table.
    let width = rows.first().map(Vec::len).unwrap_or(0);
    (0..width)
        .map(|i| ColumnMeta::new(format!("column{}", i + 1)))
        .collect()
}
