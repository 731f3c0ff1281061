//! Durable storage for the persisted token pair.
//!
//! The session core only needs a tiny string key-value store. Three backends
//! are provided: the OS keychain, a JSON file in the cache directory, and an
//! in-process map for ephemeral sessions and tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{debug, warn};

use super::StorageError;

/// Storage key for the access token
pub const TOKEN_KEY: &str = "token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// A blocking string key-value store.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a key that is not present succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Keychain
// ============================================================================

/// Stores each key as a separate entry in the OS keychain.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl TokenStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Keeps all keys in one JSON object on disk.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "Overwriting corrupt session file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "Deleting corrupt session file");
                std::fs::remove_file(&self.path)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if entries.remove(key).is_none() {
            debug!(key, "Nothing to remove");
            return Ok(());
        }
        self.write_all(&entries)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let storage = FileStorage::new(path.clone());

        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        storage.set(TOKEN_KEY, "access").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "refresh").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("access"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("refresh"));

        storage.remove(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert!(path.exists());

        // Last key gone removes the file itself
        storage.remove(REFRESH_TOKEN_KEY).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        assert!(storage.remove(TOKEN_KEY).is_ok());
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(path);
        assert!(matches!(storage.get(TOKEN_KEY), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_file_storage_remove_clears_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let storage = FileStorage::new(path.clone());

        storage.remove(TOKEN_KEY).unwrap();
        assert!(!path.exists());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);

        // A second remove after the file is gone is still fine
        storage.remove(REFRESH_TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_set_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let storage = FileStorage::new(path);

        storage.set(TOKEN_KEY, "access").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("access"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_memory_storage_overwrite() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "one").unwrap();
        storage.set(TOKEN_KEY, "two").unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("two"));

        storage.remove(TOKEN_KEY).unwrap();
        storage.remove(TOKEN_KEY).unwrap();
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }
}
