use crate::DbError;

/// Opaque secret storage consulted when configs are loaded and saved.
pub trait SecretStore: Send + Sync {
    fn is_available(&self) -> bool;
    fn get(&self, secret_ref: &str) -> Result<Option<String>, DbError>;
    fn set(&self, secret_ref: &str, value: &str) -> Result<(), DbError>;
    fn delete(&self, secret_ref: &str) -> Result<(), DbError>;
}

/// Fallback when no keyring backend is usable: secrets are simply not stored.
pub struct NoopSecretStore;

impl SecretStore for NoopSecretStore {
    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _secret_ref: &str) -> Result<Option<String>, DbError> {
        Ok(None)
    }

    fn set(&self, _secret_ref: &str, _value: &str) -> Result<(), DbError> {
        Ok(())
    }

    fn delete(&self, _secret_ref: &str) -> Result<(), DbError> {
        Ok(())
    }
}

const SERVICE_NAME: &str = "squill";

/// System keyring backed store.
pub struct KeyringSecretStore {
    available: bool,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self {
            available: Self::check_availability(),
        }
    }

    fn check_availability() -> bool {
        match keyring::Entry::new(SERVICE_NAME, "__squill_probe__") {
            Ok(entry) => {
                let _ = entry.get_password();
                true
            }
            Err(_) => false,
        }
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn is_available(&self) -> bool {
        self.available
    }

    fn get(&self, secret_ref: &str) -> Result<Option<String>, DbError> {
        if !self.available {
            return Ok(None);
        }

        let entry = keyring::Entry::new(SERVICE_NAME, secret_ref)
            .map_err(|e| DbError::Io(std::io::Error::other(e.to_string())))?;

        match entry.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(DbError::Io(std::io::Error::other(e.to_string()))),
        }
    }

    fn set(&self, secret_ref: &str, value: &str) -> Result<(), DbError> {
        if !self.available {
            return Ok(());
        }

        let entry = keyring::Entry::new(SERVICE_NAME, secret_ref)
            .map_err(|e| DbError::Io(std::io::Error::other(e.to_string())))?;

        entry
            .set_password(value)
            .map_err(|e| DbError::Io(std::io::Error::other(e.to_string())))
    }

    fn delete(&self, secret_ref: &str) -> Result<(), DbError> {
        if !self.available {
            return Ok(());
        }

        let entry = keyring::Entry::new(SERVICE_NAME, secret_ref)
            .map_err(|e| DbError::Io(std::io::Error::other(e.to_string())))?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(DbError::Io(std::io::Error::other(e.to_string()))),
        }
    }
}

pub fn connection_secret_ref(name: &str) -> String {
    format!("squill:conn:{}", name)
}

pub fn tunnel_secret_ref(name: &str) -> String {
    format!("squill:ssh:{}", name)
}

/// Keyring when available, otherwise the no-op store.
pub fn create_secret_store() -> Box<dyn SecretStore> {
    let keyring_store = KeyringSecretStore::new();
    if keyring_store.is_available() {
        Box::new(keyring_store)
    } else {
        Box::new(NoopSecretStore)
    }
}
