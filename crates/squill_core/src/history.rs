use crate::DbError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// A single executed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub sql: String,
    pub timestamp: i64,
    pub database: Option<String>,
    pub execution_time_ms: u64,
    pub row_count: Option<usize>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl HistoryEntry {
    pub fn new(
        sql: impl Into<String>,
        database: Option<String>,
        execution_time: Duration,
        row_count: Option<usize>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sql: sql.into(),
            timestamp: chrono::Utc::now().timestamp(),
            database,
            execution_time_ms: execution_time.as_millis() as u64,
            row_count,
            is_favorite: false,
        }
    }
}

/// Per-connection ring of recent queries (`history.json`).
///
/// Each connection keeps at most `max_entries` entries, newest first.
/// Favorites survive trimming.
pub struct HistoryStore {
    path: PathBuf,
    entries: HashMap<String, Vec<HistoryEntry>>,
    max_entries: usize,
}

impl HistoryStore {
    const DEFAULT_MAX_ENTRIES: usize = 1000;

    pub fn new() -> Result<Self, DbError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DbError::Io(std::io::Error::other("Could not find config directory")))?;
        let app_dir = config_dir.join("squill");
        fs::create_dir_all(&app_dir)?;
        Self::at_path(app_dir.join("history.json"))
    }

    pub fn with_dir(dir: &Path) -> Result<Self, DbError> {
        Self::at_path(dir.join("history.json"))
    }

    fn at_path(path: PathBuf) -> Result<Self, DbError> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| DbError::invalid_config(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries,
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        })
    }

    pub fn save(&self) -> Result<(), DbError> {
        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| DbError::invalid_config(e.to_string()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn add(&mut self, connection: &str, entry: HistoryEntry) {
        let ring = self.entries.entry(connection.to_string()).or_default();
        ring.insert(0, entry);

        if ring.len() > self.max_entries {
            let favorites: Vec<_> = ring.iter().filter(|e| e.is_favorite).cloned().collect();
            let keep = self.max_entries.saturating_sub(favorites.len());
            let recent: Vec<_> = ring
                .iter()
                .filter(|e| !e.is_favorite)
                .take(keep)
                .cloned()
                .collect();

            *ring = favorites;
            ring.extend(recent);
            ring.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
    }

    pub fn entries(&self, connection: &str) -> &[HistoryEntry] {
        self.entries
            .get(connection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn toggle_favorite(&mut self, connection: &str, id: Uuid) -> bool {
        if let Some(entry) = self
            .entries
            .get_mut(connection)
            .and_then(|ring| ring.iter_mut().find(|e| e.id == id))
        {
            entry.is_favorite = !entry.is_favorite;
            return entry.is_favorite;
        }
        false
    }

    pub fn search(&self, connection: &str, query: &str) -> Vec<&HistoryEntry> {
        let needle = query.to_lowercase();
        self.entries(connection)
            .iter()
            .filter(|e| e.sql.to_lowercase().contains(&needle))
            .collect()
    }
}
