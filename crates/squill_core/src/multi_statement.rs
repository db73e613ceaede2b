use crate::{MultiStatementResult, StatementResult, TransactionExecutor};

/// Runs a script statement-by-statement through a transaction executor,
/// stopping at the first failure.
///
/// Every successful statement contributes a `Query`/`NonQuery` entry; the
/// failing one contributes an `Error` entry and nothing after it runs, so
/// `successful_count` is also the index of the failure when there is one.
pub fn execute_script(
    executor: &mut TransactionExecutor,
    script: &str,
    max_rows: Option<usize>,
) -> MultiStatementResult {
    // The split is a dialect concern; route it through the adapter so
    // doubles with different splitting behavior work in tests.
    let statements = executor.adapter().split_statements(script);

    let mut results = Vec::with_capacity(statements.len());
    let mut error_index = None;

    for (index, statement) in statements.iter().enumerate() {
        match executor.execute(statement, max_rows) {
            Ok(outcome) => results.push(outcome.into()),
            Err(e) => {
                results.push(StatementResult::Error {
                    message: e.to_string(),
                });
                error_index = Some(index);
                break;
            }
        }
    }

    let successful_count = error_index.unwrap_or(results.len());

    MultiStatementResult {
        results,
        error_index,
        successful_count,
    }
}
