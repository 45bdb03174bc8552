use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Independent documents persisted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Regions,
    Thresholds,
    Config,
    Payloads,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Regions => "regions",
            StorageKey::Thresholds => "thresholds",
            StorageKey::Config => "config",
            StorageKey::Payloads => "payloads",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access '{key}' at {path}: {source}")]
    Io {
        key: StorageKey,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: StorageKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: StorageKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence port. Keys are read and written independently; a
/// failed write leaves the other documents untouched.
pub trait KeyValueStorage: Send + Sync {
    fn read(&self, key: StorageKey) -> Result<Option<String>, StorageError>;
    fn write(&self, key: StorageKey, document: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: StorageKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }
}

impl KeyValueStorage for JsonFileStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { key, path, source }),
        }
    }

    fn write(&self, key: StorageKey, document: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            key,
            path: self.root.clone(),
            source,
        })?;

        // Staged beside the target; rename replaces it in one step.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, document).map_err(|source| StorageError::Io {
            key,
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StorageError::Io { key, path, source })
    }
}

/// Process-local storage used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStorage {
    pub fn document(&self, key: StorageKey) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.document(key))
    }

    fn write(&self, key: StorageKey, document: &str) -> Result<(), StorageError> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, document.to_string());
        Ok(())
    }
}
