use serde::{Deserialize, Serialize};
use squill_core::{ConnectionConfig, StatementOutcome};

/// Frames sent from the client to the worker.
///
/// `config` travels with passwords included: the pipe is process-local and
/// the worker opens its own dedicated connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Exec {
        id: u64,
        query: String,
        config: ConnectionConfig,
        db_type: String,
        #[serde(default)]
        max_rows: Option<usize>,
    },
    Cancel {
        id: u64,
    },
    Shutdown,
}

/// Frames sent from the worker back to the client.
///
/// Every `Exec{id}` produces exactly one of `Result`, `Cancelled`, or
/// `Error` carrying the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Result {
        id: u64,
        #[serde(flatten)]
        outcome: WorkerResultBody,
        elapsed_ms: f64,
    },
    Cancelled {
        id: u64,
    },
    Error {
        id: u64,
        message: String,
    },
}

/// Result payload tagged by statement kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum WorkerResultBody {
    Query(squill_core::QueryResult),
    NonQuery(squill_core::NonQueryResult),
}

impl From<StatementOutcome> for WorkerResultBody {
    fn from(outcome: StatementOutcome) -> Self {
        match outcome {
            StatementOutcome::Query(q) => WorkerResultBody::Query(q),
            StatementOutcome::NonQuery(n) => WorkerResultBody::NonQuery(n),
        }
    }
}

impl From<WorkerResultBody> for StatementOutcome {
    fn from(body: WorkerResultBody) -> Self {
        match body {
            WorkerResultBody::Query(q) => StatementOutcome::Query(q),
            WorkerResultBody::NonQuery(n) => StatementOutcome::NonQuery(n),
        }
    }
}

impl WorkerResponse {
    /// The query id this frame answers, if any.
    pub fn id(&self) -> Option<u64> {
        match self {
            WorkerResponse::Result { id, .. }
            | WorkerResponse::Cancelled { id }
            | WorkerResponse::Error { id, .. } => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squill_core::{ColumnMeta, Endpoint, QueryResult, Value};

    #[test]
    fn exec_frame_has_type_tag() {
        let config = ConnectionConfig::new("c", "sqlite", Endpoint::File { path: "/tmp/x.db".into() });
        let frame = WorkerRequest::Exec {
            id: 3,
            query: "SELECT 1".into(),
            config,
            db_type: "sqlite".into(),
            max_rows: Some(100),
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "exec");
        assert_eq!(json["id"], 3);
        assert_eq!(json["db_type"], "sqlite");
    }

    #[test]
    fn result_frame_roundtrip() {
        let result = QueryResult::new(
            vec![ColumnMeta::new("n")],
            vec![vec![Value::Int(1)]],
        );
        let frame = WorkerResponse::Result {
            id: 9,
            outcome: WorkerResultBody::Query(result),
            elapsed_ms: 12.5,
        };

        let json = serde_json::to_string(&frame).unwrap();
        let decoded: WorkerResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.id(), Some(9));
        match decoded {
            WorkerResponse::Result { outcome: WorkerResultBody::Query(q), .. } => {
                assert_eq!(q.row_count, 1);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn config_serializes_with_secrets_for_the_pipe() {
        let config = ConnectionConfig::new(
            "c",
            "postgresql",
            Endpoint::Tcp {
                host: "localhost".into(),
                port: Some(5432),
                database: None,
                username: Some("u".into()),
                password: Some("p".into()),
            },
        );

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"p\""));
    }
}
