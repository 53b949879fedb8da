use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TdAuthError;

/// Refresh token and its expiration, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub refresh_token: String,
    pub refresh_expiration: DateTime<Utc>,
}

/// Persistence seam for the long-lived refresh token, keyed by user.
pub trait RefreshTokenStore: Send {
    fn load(&self, user: &str) -> Option<RefreshRecord>;
    fn save(&mut self, user: &str, record: &RefreshRecord) -> Result<(), TdAuthError>;
    fn delete(&mut self, user: &str);
}

/// JSON-file-backed store, one file per user under a base directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self, user: &str) -> PathBuf {
        self.dir.join(format!("{user}refreshtoken.json"))
    }
}

impl Default for FileStore {
    /// Stores records in the current working directory.
    fn default() -> Self {
        Self::new(".")
    }
}

impl RefreshTokenStore for FileStore {
    fn load(&self, user: &str) -> Option<RefreshRecord> {
        let data = std::fs::read_to_string(self.record_path(user)).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn save(&mut self, user: &str, record: &RefreshRecord) -> Result<(), TdAuthError> {
        let path = self.record_path(user);
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(record).map_err(|e| TdAuthError::Store {
            path: path.clone(),
            detail: format!("failed to serialize refresh record: {e}"),
        })?;
        std::fs::write(&path, data).map_err(|e| TdAuthError::Store {
            path,
            detail: e.to_string(),
        })
    }

    fn delete(&mut self, user: &str) {
        let _ = std::fs::remove_file(self.record_path(user));
    }
}

/// In-memory store for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, RefreshRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefreshTokenStore for MemoryStore {
    fn load(&self, user: &str) -> Option<RefreshRecord> {
        self.records.get(user).cloned()
    }

    fn save(&mut self, user: &str, record: &RefreshRecord) -> Result<(), TdAuthError> {
        self.records.insert(user.to_string(), record.clone());
        Ok(())
    }

    fn delete(&mut self, user: &str) {
        self.records.remove(user);
    }
}
