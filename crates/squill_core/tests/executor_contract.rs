use squill_core::{
    CancellableQuery, ConnectionConfig, DbError, Endpoint, ExecutionRoute, QueryPipeline,
    RemoteExecutor, StatementOutcome, StatementResult, TransactionExecutor, multi_statement,
};
use squill_test_support::{FakeAdapter, rows_result};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn config() -> ConnectionConfig {
    ConnectionConfig::new("fake", "fakedb", Endpoint::tcp("localhost", 5432))
}

#[test]
fn multi_statement_stops_at_first_error() {
    let adapter = FakeAdapter::new("fakedb")
        .with_result("SELECT 1", rows_result("?column?", &[1]))
        .with_error("SELECT 1/0", "division by zero")
        .with_result("SELECT 2", rows_result("?column?", &[2]));

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    let result =
        multi_statement::execute_script(&mut executor, "SELECT 1; SELECT 1/0; SELECT 2", None);

    // Three statements, but the stack stops at the failure: two entries.
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.successful_count, 1);
    assert_eq!(result.error_index, Some(1));
    assert!(matches!(result.results[0], StatementResult::Query(_)));
    assert!(result.results[1].is_error());
}

#[test]
fn multi_statement_full_success_has_no_error_index() {
    let adapter = FakeAdapter::new("fakedb")
        .with_result("SELECT 1", rows_result("a", &[1]))
        .with_affected("DELETE FROM t", 3);

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    let result = multi_statement::execute_script(&mut executor, "SELECT 1; DELETE FROM t", None);

    assert!(result.succeeded());
    assert_eq!(result.successful_count, 2);
    assert_eq!(result.results.len(), 2);
}

#[test]
fn transaction_keeps_connection_affinity() {
    let adapter = FakeAdapter::new("fakedb").with_result("SELECT 1", rows_result("a", &[1]));
    let spy = adapter.clone();

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());

    executor.execute("BEGIN", None).unwrap();
    assert!(executor.in_transaction());
    let token = executor.connection_token().unwrap();

    executor.execute("SELECT 1", None).unwrap();
    executor.execute("INSERT INTO t VALUES (1)", None).unwrap();
    assert_eq!(executor.connection_token(), Some(token));

    executor.execute("COMMIT", None).unwrap();
    assert!(!executor.in_transaction());

    // One physical connection served the whole transaction.
    assert_eq!(spy.stats().connect_count, 1);
    let tokens = spy.executed_tokens();
    assert!(tokens.iter().all(|t| *t == tokens[0]));
}

#[test]
fn config_change_resets_sticky_connection() {
    let adapter = FakeAdapter::new("fakedb").with_result("SELECT 1", rows_result("a", &[1]));
    let spy = adapter.clone();

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    executor.execute("SELECT 1", None).unwrap();

    executor.set_config(config().with_database("other"));
    executor.execute("SELECT 1", None).unwrap();

    assert_eq!(spy.stats().connect_count, 2);
}

#[test]
fn atomic_execute_rolls_back_on_error() {
    let adapter = FakeAdapter::new("fakedb").with_error("UPDATE t SET broken", "no such column");
    let spy = adapter.clone();

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    let err = executor.atomic_execute("UPDATE t SET broken", None).unwrap_err();

    assert!(matches!(err, DbError::QueryFailed(_)));
    assert!(!executor.in_transaction());

    let statements: Vec<String> = spy.stats().executed.into_iter().map(|(_, s)| s).collect();
    assert_eq!(statements, vec!["BEGIN", "UPDATE t SET broken", "ROLLBACK"]);
}

#[test]
fn atomic_execute_commits_on_success() {
    let adapter = FakeAdapter::new("fakedb").with_affected("UPDATE t SET a = 1", 4);
    let spy = adapter.clone();

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    let outcome = executor.atomic_execute("UPDATE t SET a = 1", None).unwrap();

    match outcome {
        StatementOutcome::NonQuery(n) => assert_eq!(n.rows_affected, 4),
        StatementOutcome::Query(_) => panic!("expected non-query outcome"),
    }

    let statements: Vec<String> = spy.stats().executed.into_iter().map(|(_, s)| s).collect();
    assert_eq!(statements, vec!["BEGIN", "UPDATE t SET a = 1", "COMMIT"]);
}

#[test]
fn row_limit_detects_truncation() {
    let adapter =
        FakeAdapter::new("fakedb").with_result("SELECT * FROM big", rows_result("n", &[1, 2, 3, 4, 5]));

    let mut executor = TransactionExecutor::new(Arc::new(adapter), config());
    let outcome = executor.execute("SELECT * FROM big", Some(3)).unwrap();

    let result = outcome.as_query().unwrap();
    assert_eq!(result.row_count, 3);
    assert!(result.truncated);

    let outcome = executor.execute("SELECT * FROM big", Some(5)).unwrap();
    let result = outcome.as_query().unwrap();
    assert_eq!(result.row_count, 5);
    assert!(!result.truncated);
}

#[test]
fn cancellable_query_cancels_within_deadline() {
    let adapter = FakeAdapter::new("fakedb").with_blocking("SELECT pg_sleep(30)");
    let cancellable = Arc::new(CancellableQuery::new(
        "SELECT pg_sleep(30)",
        config(),
        Arc::new(adapter),
    ));

    let handle = {
        let query = cancellable.clone();
        std::thread::spawn(move || query.execute(None))
    };

    std::thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    cancellable.cancel();

    let result = handle.join().unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));
    assert!(matches!(result, Err(DbError::Cancelled)));
    assert!(cancellable.is_cancelled());
}

#[test]
fn cancelled_query_never_reports_driver_errors() {
    // The blocking fake fails with a driver error when its connection is
    // forcibly closed; cancellation must mask it.
    let adapter = FakeAdapter::new("fakedb").with_blocking("SELECT 1");
    let cancellable = Arc::new(CancellableQuery::new("SELECT 1", config(), Arc::new(adapter)));

    let handle = {
        let query = cancellable.clone();
        std::thread::spawn(move || query.execute(None))
    };

    std::thread::sleep(Duration::from_millis(20));
    cancellable.cancel();

    assert!(matches!(handle.join().unwrap(), Err(DbError::Cancelled)));
}

#[test]
fn cancel_before_execute_short_circuits() {
    let adapter = FakeAdapter::new("fakedb");
    let spy = adapter.clone();
    let cancellable = CancellableQuery::new("SELECT 1", config(), Arc::new(adapter));

    cancellable.cancel();
    assert!(matches!(cancellable.execute(None), Err(DbError::Cancelled)));
    assert_eq!(spy.stats().connect_count, 0);
}

struct UnavailableRemote;

impl RemoteExecutor for UnavailableRemote {
    fn execute(
        &self,
        _query: &str,
        _config: &ConnectionConfig,
        _max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        Err(DbError::WorkerUnavailable("spawn failed".into()))
    }

    fn cancel_current(&self) {}
}

#[test]
fn pipeline_falls_back_when_worker_unavailable() {
    let adapter = FakeAdapter::new("fakedb").with_result("SELECT 1", rows_result("a", &[1]));
    let pipeline =
        QueryPipeline::new(Arc::new(adapter), config()).with_remote(Arc::new(UnavailableRemote));

    let report = pipeline.run_query("SELECT 1", None).unwrap();
    assert_eq!(report.route, ExecutionRoute::Cancellable);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("spawn failed"));
}

struct PanicRemote;

impl RemoteExecutor for PanicRemote {
    fn execute(
        &self,
        _query: &str,
        _config: &ConnectionConfig,
        _max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        panic!("worker must not be used for transactional statements");
    }

    fn cancel_current(&self) {}
}

#[test]
fn pipeline_keeps_transactions_off_the_worker() {
    let adapter = FakeAdapter::new("fakedb").with_result("SELECT 1", rows_result("a", &[1]));
    let pipeline =
        QueryPipeline::new(Arc::new(adapter), config()).with_remote(Arc::new(PanicRemote));

    let report = pipeline.run_query("BEGIN", None).unwrap();
    assert_eq!(report.route, ExecutionRoute::Transaction);

    // Plain statements stay local while the transaction is open.
    let report = pipeline.run_query("SELECT 1", None).unwrap();
    assert_eq!(report.route, ExecutionRoute::Transaction);

    let report = pipeline.run_query("ROLLBACK", None).unwrap();
    assert_eq!(report.route, ExecutionRoute::Transaction);
}

#[test]
fn pipeline_routes_scripts_locally() {
    let adapter = FakeAdapter::new("fakedb")
        .with_result("SELECT 1", rows_result("a", &[1]))
        .with_result("SELECT 2", rows_result("a", &[2]));
    let pipeline =
        QueryPipeline::new(Arc::new(adapter), config()).with_remote(Arc::new(PanicRemote));

    let report = pipeline.run_query("SELECT 1; SELECT 2", None).unwrap();
    assert_eq!(report.route, ExecutionRoute::Transaction);
    match report.outcome {
        StatementOutcome::Query(q) => assert_eq!(q.rows[0][0], squill_core::Value::Int(2)),
        StatementOutcome::NonQuery(_) => panic!("expected query outcome"),
    }
}
