use crate::{ConnectionConfig, DbError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_config_dir() -> Result<PathBuf, DbError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| DbError::Io(std::io::Error::other("Could not find config directory")))?;

    let app_dir = config_dir.join("squill");
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Persistent list of saved connections (`connections.json`).
///
/// Passwords are never serialized here; they live in the secret store under
/// each config's `secret_ref`.
pub struct ConnectionStore {
    path: PathBuf,
}

impl ConnectionStore {
    pub fn new() -> Result<Self, DbError> {
        Ok(Self {
            path: default_config_dir()?.join("connections.json"),
        })
    }

    pub fn with_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("connections.json"),
        }
    }

    pub fn load(&self) -> Result<Vec<ConnectionConfig>, DbError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| DbError::invalid_config(e.to_string()))
    }

    pub fn save(&self, configs: &[ConnectionConfig]) -> Result<(), DbError> {
        let mut scrubbed: Vec<ConnectionConfig> = configs.to_vec();
        for config in &mut scrubbed {
            if let crate::Endpoint::Tcp { password, .. } = &mut config.endpoint {
                *password = None;
            }
            if let Some(tunnel) = &mut config.tunnel {
                tunnel.password = None;
            }
        }

        let content = serde_json::to_string_pretty(&scrubbed)
            .map_err(|e| DbError::invalid_config(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Process-worker and UI settings (`settings.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_true")]
    pub process_worker: bool,
    #[serde(default)]
    pub process_worker_warm: bool,
    /// Idle seconds before the worker shuts down; `None` disables the timer.
    #[serde(default)]
    pub process_worker_auto_shutdown_s: Option<u64>,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_true() -> bool {
    true
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_max_rows() -> usize {
    1000
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            process_worker: true,
            process_worker_warm: false,
            process_worker_auto_shutdown_s: None,
            theme: default_theme(),
            max_rows: default_max_rows(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self, DbError> {
        Ok(Self {
            path: default_config_dir()?.join("settings.json"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn with_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Result<AppSettings, DbError> {
        if !self.path.exists() {
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| DbError::invalid_config(e.to_string()))
    }

    pub fn save(&self, settings: &AppSettings) -> Result<(), DbError> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| DbError::invalid_config(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Endpoint;

    #[test]
    fn connection_store_roundtrip_scrubs_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConnectionStore::with_dir(dir.path());

        let mut config = ConnectionConfig::new(
            "pg",
            "postgresql",
            Endpoint::Tcp {
                host: "localhost".into(),
                port: Some(5432),
                database: Some("app".into()),
                username: Some("postgres".into()),
                password: Some("sekrit".into()),
            },
        );
        config.tunnel = Some(crate::TunnelConfig {
            host: "bastion".into(),
            port: 22,
            username: "ops".into(),
            auth: crate::TunnelAuth::Password,
            password: Some("also-sekrit".into()),
            enabled: true,
        });

        store.save(std::slice::from_ref(&config)).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "pg");
        if let Endpoint::Tcp { password, .. } = &loaded[0].endpoint {
            assert!(password.is_none());
        } else {
            panic!("expected tcp endpoint");
        }
        assert!(loaded[0].tunnel.as_ref().unwrap().password.is_none());
    }

    #[test]
    fn settings_default_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_dir(dir.path());
        let settings = store.load().unwrap();
        assert!(settings.process_worker);
        assert!(settings.process_worker_auto_shutdown_s.is_none());
    }

    #[test]
    fn settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_dir(dir.path());

        let mut settings = AppSettings::default();
        settings.process_worker_auto_shutdown_s = Some(30);
        settings.theme = "light".into();
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
    }
}
