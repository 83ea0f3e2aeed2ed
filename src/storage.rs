//! Persistence for the download history.
//!
//! History lives under a single key of a [`KeyValueStore`]. The on-disk store keeps
//! one JSON file per key in the application data directory; tests swap in
//! [`MemoryStore`]. Nothing in this module lets a storage failure reach the task flow.

use crate::model::HistoryEntry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key holding the JSON-encoded history array.
pub const HISTORY_KEY: &str = "download_history";

/// Entries kept in the history log.
pub const HISTORY_CAP: usize = 20;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored history is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode history: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

/// Minimal string key-value capability the history log is written against.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Default data directory: `<platform data dir>/savextube-cli`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("savextube-cli")
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        // Write to a sibling temp file and rename so a crash never leaves half a log.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Newest-first log of past submissions, capped at [`HISTORY_CAP`].
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// Prepend `entry`, evict past the cap, write back. Returns the log as it should
    /// now be displayed; persistence failures are logged and otherwise ignored.
    pub fn append(&self, entry: HistoryEntry) -> Vec<HistoryEntry> {
        let mut log = self.read_all();
        log.insert(0, entry);
        log.truncate(HISTORY_CAP);
        if let Err(e) = self.try_write(&log) {
            tracing::warn!(error = %e, "failed to save download history");
        }
        log
    }

    /// The stored log, or an empty one when nothing usable is stored.
    pub fn read_all(&self) -> Vec<HistoryEntry> {
        match self.try_read() {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read download history");
                Vec::new()
            }
        }
    }

    pub(crate) fn try_read(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        match self.store.get(HISTORY_KEY)? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(StorageError::Decode)
            }
            _ => Ok(Vec::new()),
        }
    }

    pub(crate) fn try_write(&self, log: &[HistoryEntry]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(log).map_err(StorageError::Encode)?;
        self.store.set(HISTORY_KEY, &raw)
    }
}
