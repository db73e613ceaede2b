use thiserror::Error;

/// Details for a driver that could not be loaded.
///
/// Carries enough context to tell the user exactly what to install. The
/// install hint is surfaced verbatim in the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDriver {
    /// Human-readable driver name (e.g. "PostgreSQL").
    pub driver: String,
    /// Cargo feature that bundles the driver shim (e.g. "postgres").
    pub extra: String,
    /// Underlying package the shim wraps (e.g. "postgres" crate, ODBC driver).
    pub package: String,
    /// Module or library that failed to load, when known.
    pub module: Option<String>,
    /// Original load error, when known.
    pub cause: Option<String>,
}

impl MissingDriver {
    pub fn new(
        driver: impl Into<String>,
        extra: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            extra: extra.into(),
            package: package.into(),
            module: None,
            cause: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The install hint shown to the user.
    pub fn install_hint(&self) -> String {
        format!(
            "{} driver is not available. Rebuild with `--features {}` (requires the {} package).",
            self.driver, self.extra, self.package
        )
    }
}

impl std::fmt::Display for MissingDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.install_hint())?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

/// Database and execution errors.
///
/// All adapter, session, and executor operations return this type so the
/// shell can handle every backend uniformly.
#[derive(Debug, Error)]
pub enum DbError {
    /// No provider registered for the requested `db_type`.
    #[error("Unknown database type: {0}")]
    UnknownProvider(String),

    /// No provider declares the given connection URL scheme.
    #[error("Unknown connection URL scheme: {0}")]
    UnknownScheme(String),

    /// The driver backing an adapter is not compiled in or failed to load.
    #[error("{0}")]
    MissingDriver(MissingDriver),

    /// Network-level connection failure (refused, unreachable, timeout).
    #[error("Connection failed: {0}")]
    ConnectionRefused(String),

    /// The server rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// SSH tunnel could not be established or collapsed mid-session.
    #[error("SSH tunnel failed: {0}")]
    TunnelFailed(String),

    /// Statement execution failed.
    #[error("{0}")]
    QueryFailed(String),

    /// Query was cancelled via `CancellableQuery::cancel()`.
    #[error("Query cancelled")]
    Cancelled,

    /// The process worker could not be started or its pipe collapsed.
    #[error("Process worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The worker already has a query in flight.
    #[error("Worker is busy.")]
    WorkerBusy,

    /// Multi-statement scripts must run in-process, never in the worker.
    #[error("Multi-statement queries are not supported in the process worker.")]
    MultiStatementInWorker,

    /// An operation that needs a live connection was invoked without one.
    #[error("No active connection")]
    NoActiveConnection,

    /// Connection config is malformed or missing required fields.
    #[error("Invalid connection config: {0}")]
    InvalidConfig(String),

    /// Filesystem or pipe I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub fn connection_refused(msg: impl Into<String>) -> Self {
        Self::ConnectionRefused(msg.into())
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    pub fn tunnel_failed(msg: impl Into<String>) -> Self {
        Self::TunnelFailed(msg.into())
    }

    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error is a cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
