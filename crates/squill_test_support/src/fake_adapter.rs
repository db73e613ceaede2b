use squill_core::{
    Adapter, ColumnInfo, ColumnMeta, ConnectionConfig, Cursor, DbError, DriverConnection,
    ObjectRef, ProviderRegistry, ProviderSpec, QueryResult, Row, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Scripted outcome for one statement.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Row-returning result.
    Rows(QueryResult),
    /// Non-query result with an affected-row count.
    Affected(u64),
    /// Driver error.
    Error(String),
    /// Block until the owning connection is closed, then fail the way a
    /// driver does when its socket disappears. Used by cancellation tests.
    BlockUntilClosed,
}

/// Convenience: a one-column result with the given integer rows.
pub fn rows_result(column: &str, values: &[i64]) -> QueryResult {
    QueryResult::new(
        vec![ColumnMeta::new(column)],
        values.iter().map(|v| vec![Value::Int(*v)]).collect(),
    )
}

#[derive(Debug, Clone, Default)]
pub struct FakeStats {
    pub connect_count: usize,
    pub executed: Vec<(usize, String)>,
    pub interrupts: usize,
}

#[derive(Default)]
struct FakeState {
    outcomes: RwLock<HashMap<String, FakeOutcome>>,
    default_outcome: RwLock<Option<FakeOutcome>>,
    connect_error: RwLock<Option<DbErrorSpec>>,
    connect_count: AtomicUsize,
    interrupts: AtomicUsize,
    /// (connection token, statement) in execution order.
    executed: Mutex<Vec<(usize, String)>>,
}

#[derive(Debug, Clone)]
enum DbErrorSpec {
    Refused(String),
    Auth(String),
    MissingDriver,
}

impl DbErrorSpec {
    fn into_error(&self, db_type: &str) -> DbError {
        match self {
            Self::Refused(msg) => DbError::connection_refused(msg.clone()),
            Self::Auth(msg) => DbError::auth_failed(msg.clone()),
            Self::MissingDriver => DbError::MissingDriver(squill_core::MissingDriver::new(
                db_type.to_uppercase(),
                db_type,
                format!("{}-driver", db_type),
            )),
        }
    }
}

/// Scriptable adapter double, shared across the executor, worker, and
/// session tests.
#[derive(Clone)]
pub struct FakeAdapter {
    db_type: String,
    state: Arc<FakeState>,
}

impl FakeAdapter {
    pub fn new(db_type: impl Into<String>) -> Self {
        Self {
            db_type: db_type.into(),
            state: Arc::new(FakeState::default()),
        }
    }

    pub fn with_result(self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.set_outcome(sql, FakeOutcome::Rows(result));
        self
    }

    pub fn with_affected(self, sql: impl Into<String>, rows: u64) -> Self {
        self.set_outcome(sql, FakeOutcome::Affected(rows));
        self
    }

    pub fn with_error(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.set_outcome(sql, FakeOutcome::Error(message.into()));
        self
    }

    pub fn with_blocking(self, sql: impl Into<String>) -> Self {
        self.set_outcome(sql, FakeOutcome::BlockUntilClosed);
        self
    }

    pub fn with_default(self, outcome: FakeOutcome) -> Self {
        *self.state.default_outcome.write().expect("fake poisoned") = Some(outcome);
        self
    }

    pub fn with_connect_refused(self, message: impl Into<String>) -> Self {
        *self.state.connect_error.write().expect("fake poisoned") =
            Some(DbErrorSpec::Refused(message.into()));
        self
    }

    pub fn with_auth_failure(self, message: impl Into<String>) -> Self {
        *self.state.connect_error.write().expect("fake poisoned") =
            Some(DbErrorSpec::Auth(message.into()));
        self
    }

    pub fn with_missing_driver(self) -> Self {
        *self.state.connect_error.write().expect("fake poisoned") = Some(DbErrorSpec::MissingDriver);
        self
    }

    pub fn set_outcome(&self, sql: impl Into<String>, outcome: FakeOutcome) {
        self.state
            .outcomes
            .write()
            .expect("fake poisoned")
            .insert(sql.into(), outcome);
    }

    pub fn stats(&self) -> FakeStats {
        FakeStats {
            connect_count: self.state.connect_count.load(Ordering::SeqCst),
            executed: self.state.executed.lock().expect("fake poisoned").clone(),
            interrupts: self.state.interrupts.load(Ordering::SeqCst),
        }
    }

    /// Tokens of the connections each recorded statement ran on.
    pub fn executed_tokens(&self) -> Vec<usize> {
        self.stats().executed.iter().map(|(t, _)| *t).collect()
    }
}

impl Adapter for FakeAdapter {
    fn db_type(&self) -> &str {
        &self.db_type
    }

    fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>, DbError> {
        if let Some(spec) = self.state.connect_error.read().expect("fake poisoned").as_ref() {
            return Err(spec.into_error(&self.db_type));
        }

        let token = self.state.connect_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            token,
        }))
    }

    fn list_tables(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
    ) -> Result<Vec<ObjectRef>, DbError> {
        Ok(Vec::new())
    }

    fn list_columns(
        &self,
        _conn: &dyn DriverConnection,
        _database: Option<&str>,
        _schema: Option<&str>,
        _table: &str,
    ) -> Result<Vec<ColumnInfo>, DbError> {
        Ok(Vec::new())
    }
}

struct FakeConnection {
    state: Arc<FakeState>,
    closed: Arc<AtomicBool>,
    token: usize,
}

impl DriverConnection for FakeConnection {
    fn cursor(&self) -> Result<Box<dyn Cursor>, DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::query_failed("connection closed"));
        }
        Ok(Box::new(FakeCursor {
            state: self.state.clone(),
            closed: self.closed.clone(),
            token: self.token,
            pending: Vec::new(),
            columns: None,
            affected: None,
        }))
    }

    fn interrupt(&self) -> Result<(), DbError> {
        self.state.interrupts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct FakeCursor {
    state: Arc<FakeState>,
    closed: Arc<AtomicBool>,
    token: usize,
    pending: Vec<Row>,
    columns: Option<Vec<ColumnMeta>>,
    affected: Option<u64>,
}

impl Cursor for FakeCursor {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::query_failed("connection closed"));
        }

        self.state
            .executed
            .lock()
            .expect("fake poisoned")
            .push((self.token, sql.to_string()));

        let outcome = {
            let outcomes = self.state.outcomes.read().expect("fake poisoned");
            outcomes.get(sql).cloned().or_else(|| {
                self.state
                    .default_outcome
                    .read()
                    .expect("fake poisoned")
                    .clone()
            })
        };

        match outcome {
            Some(FakeOutcome::Rows(result)) => {
                self.columns = Some(result.columns);
                self.pending = result.rows;
                self.affected = None;
                Ok(())
            }
            Some(FakeOutcome::Affected(rows)) => {
                self.columns = None;
                self.pending = Vec::new();
                self.affected = Some(rows);
                Ok(())
            }
            Some(FakeOutcome::Error(message)) => Err(DbError::query_failed(message)),
            Some(FakeOutcome::BlockUntilClosed) => {
                while !self.closed.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(DbError::query_failed("server closed the connection"))
            }
            // Unscripted statements behave like successful DDL.
            None => {
                self.columns = None;
                self.pending = Vec::new();
                self.affected = Some(0);
                Ok(())
            }
        }
    }

    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>, DbError> {
        let take = size.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    fn description(&self) -> Option<Vec<ColumnMeta>> {
        self.columns.clone()
    }

    fn rows_affected(&self) -> Option<u64> {
        self.affected
    }
}

/// A registry with one fake provider installed, for session and URL tests.
pub fn fake_registry(db_type: &str, adapter: FakeAdapter) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let mut spec = ProviderSpec::new(db_type, db_type.to_uppercase());
    spec.url_schemes = vec![db_type.to_string()];
    registry.register(spec, Arc::new(adapter));
    registry
}
