use crate::DbError;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-connection set of starred query strings (`starred.json`).
pub struct StarredStore {
    path: PathBuf,
    starred: HashMap<String, BTreeSet<String>>,
}

impl StarredStore {
    pub fn new() -> Result<Self, DbError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DbError::Io(std::io::Error::other("Could not find config directory")))?;
        let app_dir = config_dir.join("squill");
        fs::create_dir_all(&app_dir)?;
        Self::at_path(app_dir.join("starred.json"))
    }

    pub fn with_dir(dir: &Path) -> Result<Self, DbError> {
        Self::at_path(dir.join("starred.json"))
    }

    fn at_path(path: PathBuf) -> Result<Self, DbError> {
        let starred = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| DbError::invalid_config(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self { path, starred })
    }

    pub fn save(&self) -> Result<(), DbError> {
        let content = serde_json::to_string_pretty(&self.starred)
            .map_err(|e| DbError::invalid_config(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Star a query. Returns `false` when it was already starred.
    pub fn star(&mut self, connection: &str, sql: impl Into<String>) -> bool {
        self.starred
            .entry(connection.to_string())
            .or_default()
            .insert(sql.into())
    }

    pub fn unstar(&mut self, connection: &str, sql: &str) -> bool {
        self.starred
            .get_mut(connection)
            .map(|set| set.remove(sql))
            .unwrap_or(false)
    }

    pub fn is_starred(&self, connection: &str, sql: &str) -> bool {
        self.starred
            .get(connection)
            .map(|set| set.contains(sql))
            .unwrap_or(false)
    }

    pub fn starred(&self, connection: &str) -> Vec<&str> {
        self.starred
            .get(connection)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_unstar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StarredStore::with_dir(dir.path()).unwrap();

        assert!(store.star("pg", "SELECT 1"));
        assert!(!store.star("pg", "SELECT 1"));
        assert!(store.is_starred("pg", "SELECT 1"));
        assert!(!store.is_starred("mysql", "SELECT 1"));

        store.save().unwrap();
        let reloaded = StarredStore::with_dir(dir.path()).unwrap();
        assert!(reloaded.is_starred("pg", "SELECT 1"));

        let mut store = reloaded;
        assert!(store.unstar("pg", "SELECT 1"));
        assert!(!store.unstar("pg", "SELECT 1"));
    }
}
