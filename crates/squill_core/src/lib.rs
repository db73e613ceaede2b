mod adapter;
mod cancellable;
mod config;
mod discovery;
mod error;
mod history;
mod idle;
mod registry;
mod result;
mod secrets;
mod session;
mod starred;
mod store;
mod transaction;
mod url;
mod value;

pub mod multi_statement;
pub mod pipeline;
pub mod sql;

pub use adapter::{
    Adapter, ColumnInfo, Cursor, DatabaseCursor, DriverConnection, ObjectRef,
};
pub use cancellable::CancellableQuery;
pub use config::{ConnectionConfig, Endpoint, TunnelAuth, TunnelConfig, TunnelKey};
pub use discovery::{
    ConnectionCandidate, DetectedContainer, DiscoveryIngestion, DiscoverySource, DockerStatus,
    ProviderState,
};
pub use error::{DbError, MissingDriver};
pub use history::{HistoryEntry, HistoryStore};
pub use idle::IdleScheduler;
pub use pipeline::{ExecutionReport, ExecutionRoute, QueryPipeline, RemoteExecutor, ScriptReport};
pub use registry::{DockerHints, Provider, ProviderRegistry, ProviderSpec};
pub use result::{
    ColumnMeta, MultiStatementResult, NonQueryResult, QueryResult, Row, StatementOutcome,
    StatementResult,
};
pub use secrets::{
    KeyringSecretStore, NoopSecretStore, SecretStore, connection_secret_ref, create_secret_store,
    tunnel_secret_ref,
};
pub use session::{ConnectionSession, SessionFactory, Tunnel, TunnelCache, TunnelFactory};
pub use starred::StarredStore;
pub use store::{AppSettings, ConnectionStore, SettingsStore};
pub use transaction::TransactionExecutor;
pub use url::parse_connection_url;
pub use value::Value;

/// Default adapter connect timeout.
pub const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
