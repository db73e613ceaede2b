use crate::{
    ConnectionConfig, DatabaseCursor, DbError, DriverConnection, Provider, ProviderRegistry,
    TunnelKey,
};
use log::{info, warn};
use std::sync::{Arc, Mutex};

/// A live SSH tunnel. Implemented by `squill_ssh`; core only needs the local
/// bind and a way to stop forwarding.
pub trait Tunnel: Send + Sync {
    fn local_port(&self) -> u16;
    fn stop(&self);
}

/// Opens tunnels from a config's tunnel block toward a target endpoint.
pub trait TunnelFactory: Send + Sync {
    fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Tunnel>, DbError>;
}

/// Caches one live tunnel keyed by `(host, port, user, auth, secret)`.
///
/// Requesting the same key reuses the tunnel; a different key tears the old
/// one down first. Used by the session factory and, with its own instance,
/// by the process worker.
pub struct TunnelCache {
    factory: Arc<dyn TunnelFactory>,
    current: Mutex<Option<(TunnelKey, Arc<dyn Tunnel>)>>,
}

impl TunnelCache {
    pub fn new(factory: Arc<dyn TunnelFactory>) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
        }
    }

    /// Tunnel for `config`, or `None` when the config has no enabled tunnel
    /// block (any cached tunnel is closed in that case).
    pub fn ensure(&self, config: &ConnectionConfig) -> Result<Option<Arc<dyn Tunnel>>, DbError> {
        let Some(key) = config.tunnel_key() else {
            self.close();
            return Ok(None);
        };

        let mut slot = self.current.lock().expect("tunnel cache poisoned");
        if let Some((cached_key, tunnel)) = slot.as_ref()
            && *cached_key == key
        {
            return Ok(Some(tunnel.clone()));
        }

        if let Some((_, old)) = slot.take() {
            old.stop();
        }

        let tunnel = self.factory.open(config)?;
        *slot = Some((key, tunnel.clone()));
        Ok(Some(tunnel))
    }

    pub fn close(&self) {
        let mut slot = self.current.lock().expect("tunnel cache poisoned");
        if let Some((_, tunnel)) = slot.take() {
            tunnel.stop();
        }
    }
}

/// Owning aggregate of one user connection: config, provider, optional
/// tunnel, and the live driver connection.
///
/// The session owns its tunnel and connection; `close` releases them in
/// reverse acquisition order.
pub struct ConnectionSession {
    config: ConnectionConfig,
    effective_config: ConnectionConfig,
    provider: Arc<Provider>,
    tunnel: Option<Arc<dyn Tunnel>>,
    conn: Box<dyn DriverConnection>,
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("config", &self.config)
            .field("effective_config", &self.effective_config)
            .finish_non_exhaustive()
    }
}

impl ConnectionSession {
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<Provider> {
        &self.provider
    }

    pub fn connection(&self) -> &dyn DriverConnection {
        self.conn.as_ref()
    }

    /// The config the adapter actually connected with (tunnel bind applied).
    pub fn effective_config(&self) -> &ConnectionConfig {
        &self.effective_config
    }

    /// A cursor scoped to `database`, delegating the switching strategy to
    /// the adapter.
    pub fn cursor_for(&self, database: Option<&str>) -> Result<DatabaseCursor, DbError> {
        self.provider
            .adapter
            .cursor_for_database(self.conn.as_ref(), &self.effective_config, database)
    }

    /// Close the connection, then stop the tunnel. Errors are swallowed; a
    /// session close must always complete.
    pub fn close(self) {
        self.conn.close();
        if let Some(tunnel) = self.tunnel {
            tunnel.stop();
        }
        info!("session closed: {}", self.config.name);
    }
}

/// Builds sessions: tunnel first, endpoint rewritten to the tunnel bind,
/// then the adapter connect.
pub struct SessionFactory {
    registry: Arc<ProviderRegistry>,
    tunnels: Option<Arc<dyn TunnelFactory>>,
}

impl SessionFactory {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            tunnels: None,
        }
    }

    pub fn with_tunnels(mut self, tunnels: Arc<dyn TunnelFactory>) -> Self {
        self.tunnels = Some(tunnels);
        self
    }

    pub fn build(&self, config: &ConnectionConfig) -> Result<ConnectionSession, DbError> {
        let provider = self.registry.get(&config.db_type)?;

        let tunnel = match (config.tunnel_key(), &self.tunnels) {
            (Some(_), Some(factory)) => Some(factory.open(config)?),
            (Some(_), None) => {
                return Err(DbError::tunnel_failed(
                    "connection requires an SSH tunnel but no tunnel support is configured",
                ));
            }
            (None, _) => None,
        };

        let effective_config = match &tunnel {
            Some(t) => config.with_tunnel_bind(t.local_port()),
            None => config.clone(),
        };

        match provider.adapter.connect(&effective_config) {
            Ok(conn) => Ok(ConnectionSession {
                config: config.clone(),
                effective_config,
                provider,
                tunnel,
                conn,
            }),
            Err(e) => {
                // Connect failed after the tunnel came up; do not leak it.
                if let Some(t) = tunnel {
                    warn!("connect failed, stopping tunnel for {}", config.name);
                    t.stop();
                }
                Err(e)
            }
        }
    }
}
