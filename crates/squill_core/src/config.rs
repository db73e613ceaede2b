use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to reach the database process.
///
/// Exactly one shape applies per connection; the enum enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Endpoint {
    /// Classic TCP server (most backends).
    Tcp {
        host: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        database: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// Local file (SQLite, DuckDB).
    File { path: PathBuf },
    /// Provider-specific URI (Turso, BigQuery, Athena).
    Uri { uri: String },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port: Some(port),
            database: None,
            username: None,
            password: None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Endpoint::Tcp { host, .. } => Some(host),
            _ => None,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Endpoint::Tcp { port, .. } => *port,
            _ => None,
        }
    }

    pub fn database(&self) -> Option<&str> {
        match self {
            Endpoint::Tcp { database, .. } => database.as_deref(),
            _ => None,
        }
    }
}

/// SSH authentication method for a tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelAuth {
    Password,
    Key {
        #[serde(default)]
        key_path: Option<PathBuf>,
    },
}

impl Default for TunnelAuth {
    fn default() -> Self {
        TunnelAuth::Key { key_path: None }
    }
}

/// SSH tunnel block of a connection config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth: TunnelAuth,
    /// Password or key passphrase. Persisted stores indirect this through the
    /// secret store; it is only populated in memory and on the worker pipe.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// Identity of a tunnel endpoint. Two configs that produce the same key can
/// share one live tunnel; a key change forces tear-down and rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TunnelKey {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: String,
    pub secret: Option<String>,
}

impl TunnelConfig {
    pub fn key(&self) -> TunnelKey {
        let (auth, secret) = match &self.auth {
            TunnelAuth::Password => ("password".to_string(), self.password.clone()),
            TunnelAuth::Key { key_path } => (
                format!(
                    "key:{}",
                    key_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ),
                self.password.clone(),
            ),
        };
        TunnelKey {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth,
            secret,
        }
    }
}

/// Immutable description of one reachable database.
///
/// Produced by discovery, URL parsing, or manual entry; persisted with the
/// password indirected through the secret store; consumed read-only by
/// sessions and executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Stable user-facing name; also the dedup identity for discovery.
    pub name: String,
    /// Provider key (registry lookup).
    pub db_type: String,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub tunnel: Option<TunnelConfig>,
    /// Free-form provider options (e.g. `supabase_region`).
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, db_type: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
            endpoint,
            tunnel: None,
            options: IndexMap::new(),
        }
    }

    /// Active tunnel key, if the config carries an enabled tunnel block.
    pub fn tunnel_key(&self) -> Option<TunnelKey> {
        self.tunnel
            .as_ref()
            .filter(|t| t.enabled)
            .map(TunnelConfig::key)
    }

    /// A copy of this config pointing at a different database.
    ///
    /// File- and URI-shaped endpoints cannot switch databases; the copy is
    /// returned unchanged for those.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        let mut config = self.clone();
        if let Endpoint::Tcp {
            database: db_slot, ..
        } = &mut config.endpoint
        {
            *db_slot = Some(database.into());
        }
        config
    }

    /// A copy of this config rewritten to reach a tunnel's local bind.
    pub fn with_tunnel_bind(&self, local_port: u16) -> Self {
        let mut config = self.clone();
        if let Endpoint::Tcp { host, port, .. } = &mut config.endpoint {
            *host = "127.0.0.1".to_string();
            *port = Some(local_port);
        }
        config
    }

    /// Identity tuple used for discovery deduplication.
    pub fn endpoint_identity(&self) -> (&str, Option<&str>, Option<u16>, Option<&str>) {
        (
            self.db_type.as_str(),
            self.endpoint.host(),
            self.endpoint.port(),
            self.endpoint.database(),
        )
    }

    /// Reference under which the secret store keeps this config's password.
    pub fn secret_ref(&self) -> String {
        crate::secrets::connection_secret_ref(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_config() -> ConnectionConfig {
        ConnectionConfig::new(
            "local-pg",
            "postgresql",
            Endpoint::Tcp {
                host: "localhost".into(),
                port: Some(5432),
                database: Some("app".into()),
                username: Some("postgres".into()),
                password: None,
            },
        )
    }

    #[test]
    fn database_override_rewrites_tcp_endpoint() {
        let config = tcp_config().with_database("analytics");
        assert_eq!(config.endpoint.database(), Some("analytics"));
        assert_eq!(config.endpoint.host(), Some("localhost"));
    }

    #[test]
    fn database_override_leaves_file_endpoint_alone() {
        let config = ConnectionConfig::new(
            "local-sqlite",
            "sqlite",
            Endpoint::File {
                path: "/tmp/app.db".into(),
            },
        );
        let overridden = config.with_database("other");
        assert_eq!(overridden.endpoint, config.endpoint);
    }

    #[test]
    fn tunnel_key_requires_enabled_block() {
        let mut config = tcp_config();
        config.tunnel = Some(TunnelConfig {
            host: "bastion".into(),
            port: 22,
            username: "ops".into(),
            auth: TunnelAuth::Password,
            password: Some("hunter2".into()),
            enabled: false,
        });
        assert!(config.tunnel_key().is_none());

        config.tunnel.as_mut().unwrap().enabled = true;
        let key = config.tunnel_key().unwrap();
        assert_eq!(key.host, "bastion");
        assert_eq!(key.auth, "password");
    }

    #[test]
    fn tunnel_bind_rewrite_targets_loopback() {
        let config = tcp_config().with_tunnel_bind(50123);
        assert_eq!(config.endpoint.host(), Some("127.0.0.1"));
        assert_eq!(config.endpoint.port(), Some(50123));
        // Database and credentials survive the rewrite.
        assert_eq!(config.endpoint.database(), Some("app"));
    }
}
