use crate::Value;
use serde::{Deserialize, Serialize};

pub type Row = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: "TEXT".to_string(),
            nullable: true,
        }
    }
}

/// Result of a row-returning statement.
///
/// `truncated` is set when the statement produced more rows than the caller's
/// `max_rows` cap; the extra rows are dropped, never buffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub truncated: bool,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            truncated: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Result of a statement that returns no rows (INSERT/UPDATE/DDL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonQueryResult {
    pub rows_affected: u64,
}

/// Outcome of executing a single statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementOutcome {
    Query(QueryResult),
    NonQuery(NonQueryResult),
}

impl StatementOutcome {
    pub fn as_query(&self) -> Option<&QueryResult> {
        match self {
            StatementOutcome::Query(q) => Some(q),
            StatementOutcome::NonQuery(_) => None,
        }
    }
}

/// One entry in a multi-statement result stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementResult {
    Query(QueryResult),
    NonQuery(NonQueryResult),
    Error { message: String },
}

impl From<StatementOutcome> for StatementResult {
    fn from(outcome: StatementOutcome) -> Self {
        match outcome {
            StatementOutcome::Query(q) => StatementResult::Query(q),
            StatementOutcome::NonQuery(n) => StatementResult::NonQuery(n),
        }
    }
}

impl StatementResult {
    pub fn is_error(&self) -> bool {
        matches!(self, StatementResult::Error { .. })
    }
}

/// Stacked per-statement result for a script.
///
/// Execution stops at the first failing statement: entries `[0..error_index)`
/// are successes, the entry at `error_index` is the failure, and nothing is
/// recorded for the statements after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStatementResult {
    pub results: Vec<StatementResult>,
    pub error_index: Option<usize>,
    pub successful_count: usize,
}

impl MultiStatementResult {
    pub fn succeeded(&self) -> bool {
        self.error_index.is_none()
    }
}
