use crate::{
    Adapter, CancellableQuery, ConnectionConfig, DbError, MultiStatementResult, StatementOutcome,
    TransactionExecutor, multi_statement, sql,
};
use log::{info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Out-of-process execution behind a trait so the core does not depend on
/// the worker crate. `squill_worker` implements this for its client.
pub trait RemoteExecutor: Send + Sync {
    /// Run a single statement remotely. Transport failures map to
    /// `WorkerUnavailable`; the pipeline falls back to local execution on
    /// that error.
    fn execute(
        &self,
        query: &str,
        config: &ConnectionConfig,
        max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError>;

    /// Fire-and-forget cancellation of the in-flight remote query.
    fn cancel_current(&self);
}

/// How a statement was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionRoute {
    Transaction,
    Cancellable,
    Worker,
}

#[derive(Debug)]
pub struct ExecutionReport {
    pub outcome: StatementOutcome,
    pub elapsed: Duration,
    pub route: ExecutionRoute,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct ScriptReport {
    pub result: MultiStatementResult,
    pub elapsed: Duration,
}

/// Routes statements to the right executor.
///
/// Transaction-relevant statements (sentinels, anything while a transaction
/// is open) stay on the persistent connection. Everything else goes to the
/// process worker when enabled, or to a dedicated cancellable query. Scripts
/// always run locally, statement by statement.
pub struct QueryPipeline {
    executor: Arc<Mutex<TransactionExecutor>>,
    remote: Option<Arc<dyn RemoteExecutor>>,
    worker_enabled: bool,
    cancellable: Mutex<Option<Arc<CancellableQuery>>>,
}

impl QueryPipeline {
    pub fn new(adapter: Arc<dyn Adapter>, config: ConnectionConfig) -> Self {
        Self {
            executor: Arc::new(Mutex::new(TransactionExecutor::new(adapter, config))),
            remote: None,
            worker_enabled: false,
            cancellable: Mutex::new(None),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = Some(remote);
        self.worker_enabled = true;
        self
    }

    pub fn set_worker_enabled(&mut self, enabled: bool) {
        self.worker_enabled = enabled;
    }

    pub fn executor(&self) -> &Arc<Mutex<TransactionExecutor>> {
        &self.executor
    }

    /// Point the pipeline at a different config, resetting the sticky
    /// connection.
    pub fn set_config(&self, config: ConnectionConfig) {
        self.executor
            .lock()
            .expect("transaction executor poisoned")
            .set_config(config);
    }

    /// Execute a statement or script, choosing the route per the affinity
    /// rules.
    pub fn run_query(&self, query: &str, max_rows: Option<usize>) -> Result<ExecutionReport, DbError> {
        let start = Instant::now();

        let (statements, in_transaction, config, adapter) = {
            let executor = self.executor.lock().expect("transaction executor poisoned");
            (
                executor.adapter().split_statements(query),
                executor.in_transaction(),
                executor.config().clone(),
                executor.adapter().clone(),
            )
        };

        if statements.is_empty() {
            return Err(DbError::query_failed("Nothing to execute"));
        }

        if statements.len() > 1 {
            // Whole scripts are a local concern; the worker refuses them.
            let report = self.run_script_locally(query, max_rows)?;
            return Ok(report);
        }

        let statement = &statements[0];
        let transactional =
            in_transaction || sql::transaction_sentinel(statement).is_some();

        if transactional {
            let outcome = self
                .executor
                .lock()
                .expect("transaction executor poisoned")
                .execute(statement, max_rows)?;
            return Ok(ExecutionReport {
                outcome,
                elapsed: start.elapsed(),
                route: ExecutionRoute::Transaction,
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();

        if self.worker_enabled
            && let Some(remote) = &self.remote
        {
            match remote.execute(statement, &config, max_rows) {
                Ok((outcome, elapsed)) => {
                    return Ok(ExecutionReport {
                        outcome,
                        elapsed,
                        route: ExecutionRoute::Worker,
                        warnings,
                    });
                }
                Err(DbError::WorkerUnavailable(reason)) => {
                    warn!("process worker unavailable, running in-process: {}", reason);
                    warnings.push(format!(
                        "Process worker unavailable ({}); executed in-process.",
                        reason
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        let cancellable = Arc::new(CancellableQuery::new(statement.clone(), config, adapter));
        *self.cancellable.lock().expect("cancellable slot poisoned") = Some(cancellable.clone());

        let result = cancellable.execute(max_rows);

        self.cancellable
            .lock()
            .expect("cancellable slot poisoned")
            .take();

        Ok(ExecutionReport {
            outcome: result?,
            elapsed: start.elapsed(),
            route: ExecutionRoute::Cancellable,
            warnings,
        })
    }

    /// Execute a script atomically: rolled back entirely on any failure.
    pub fn run_query_atomic(
        &self,
        query: &str,
        max_rows: Option<usize>,
    ) -> Result<ExecutionReport, DbError> {
        let start = Instant::now();
        let outcome = self
            .executor
            .lock()
            .expect("transaction executor poisoned")
            .atomic_execute(query, max_rows)?;

        Ok(ExecutionReport {
            outcome,
            elapsed: start.elapsed(),
            route: ExecutionRoute::Transaction,
            warnings: Vec::new(),
        })
    }

    /// Execute a script returning the per-statement result stack.
    pub fn run_script(&self, script: &str, max_rows: Option<usize>) -> ScriptReport {
        let start = Instant::now();
        let result = {
            let mut executor = self.executor.lock().expect("transaction executor poisoned");
            multi_statement::execute_script(&mut executor, script, max_rows)
        };

        ScriptReport {
            result,
            elapsed: start.elapsed(),
        }
    }

    fn run_script_locally(
        &self,
        script: &str,
        max_rows: Option<usize>,
    ) -> Result<ExecutionReport, DbError> {
        let report = self.run_script(script, max_rows);

        // A single-result stack collapses to its one outcome; otherwise the
        // caller wants the stack and should use `run_script` directly. The
        // pipeline keeps the last successful outcome and surfaces the first
        // error, mirroring statement-at-a-time submission.
        if let Some(index) = report.result.error_index {
            let message = match &report.result.results[index] {
                crate::StatementResult::Error { message } => message.clone(),
                _ => "statement failed".to_string(),
            };
            return Err(DbError::query_failed(message));
        }

        let outcome = report
            .result
            .results
            .into_iter()
            .rev()
            .find_map(|r| match r {
                crate::StatementResult::Query(q) => Some(StatementOutcome::Query(q)),
                crate::StatementResult::NonQuery(n) => Some(StatementOutcome::NonQuery(n)),
                crate::StatementResult::Error { .. } => None,
            })
            .ok_or_else(|| DbError::query_failed("Nothing to execute"))?;

        Ok(ExecutionReport {
            outcome,
            elapsed: report.elapsed,
            route: ExecutionRoute::Transaction,
            warnings: Vec::new(),
        })
    }

    /// Cancel whatever is live: the in-flight cancellable query and the
    /// current worker query.
    pub fn cancel_operation(&self) {
        if let Some(cancellable) = self
            .cancellable
            .lock()
            .expect("cancellable slot poisoned")
            .as_ref()
        {
            info!("cancelling in-process query");
            cancellable.cancel();
        }

        if let Some(remote) = &self.remote {
            remote.cancel_current();
        }
    }

    /// Drop the sticky connection (disconnect).
    pub fn reset(&self) {
        self.executor
            .lock()
            .expect("transaction executor poisoned")
            .reset();
    }
}

/// Async wrappers: blocking driver calls move to the blocking pool so the
/// event loop never stalls.
impl QueryPipeline {
    pub async fn run_query_async(
        self: Arc<Self>,
        query: String,
        max_rows: Option<usize>,
    ) -> Result<ExecutionReport, DbError> {
        tokio::task::spawn_blocking(move || self.run_query(&query, max_rows))
            .await
            .map_err(|e| DbError::query_failed(format!("execution task failed: {}", e)))?
    }

    pub async fn run_query_atomic_async(
        self: Arc<Self>,
        query: String,
        max_rows: Option<usize>,
    ) -> Result<ExecutionReport, DbError> {
        tokio::task::spawn_blocking(move || self.run_query_atomic(&query, max_rows))
            .await
            .map_err(|e| DbError::query_failed(format!("execution task failed: {}", e)))?
    }

    pub async fn run_script_async(
        self: Arc<Self>,
        script: String,
        max_rows: Option<usize>,
    ) -> Result<ScriptReport, DbError> {
        tokio::task::spawn_blocking(move || self.run_script(&script, max_rows))
            .await
            .map_err(|e| DbError::query_failed(format!("execution task failed: {}", e)))
    }
}
