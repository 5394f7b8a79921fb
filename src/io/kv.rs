use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;

/// Error type for key-value store operations
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("invalid key '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidKey(String),
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("store rejected write for '{0}': quota exceeded")]
    QuotaExceeded(String),
}

/// Local byte store keyed by short names.
pub trait KeyValueStore {
    /// Read a value; `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KvError>;
    /// Remove a key. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), KvError>;
    /// Directory where failures against this store are logged, if any.
    fn log_dir(&self) -> Option<&Path> {
        None
    }
}

fn validate_key(key: &str) -> Result<(), KvError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(KvError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One file per key (`<dir>/<key>.json`), replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KvError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| KvError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(FileKv { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, KvError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(KvError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KvError> {
        let path = self.path_for(key)?;
        atomic_write(&path, value).map_err(|source| KvError::Io { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KvError::Io { path, source }),
        }
    }

    fn log_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store with an optional byte quota, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, Vec<u8>>,
    quota: Option<usize>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose total size may not exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        MemoryKv {
            entries: HashMap::new(),
            quota: Some(bytes),
        }
    }

    fn used_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), KvError> {
        validate_key(key)?;
        if let Some(quota) = self.quota
            && self.used_without(key) + value.len() > quota
        {
            return Err(KvError::QuotaExceeded(key.to_string()));
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), KvError> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}
