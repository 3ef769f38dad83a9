//! Key-value storage backends
//!
//! The tracker persists string values under string keys, the same model as a
//! browser's `localStorage`. Backends report failures; the layers above decide
//! whether a failure is fatal (it never is for capture).

use crate::error::StorageError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// String-valued key-value storage
pub trait KeyValueStore {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key` (absent keys are not an error)
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// In-memory store with an optional byte quota and a simulated outage switch
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
    quota_bytes: Option<usize>,
    unavailable: bool,
}

impl MemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once keys plus values exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail with [`StorageError::Unavailable`]
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Drop every stored value
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        if let Some(limit) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.items.remove(key);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
///
/// Characters outside `[A-Za-z0-9_-]` map to `_` in file names, so keys such
/// as `a.b` and `a_b` share a file. Namespaced keys from [`crate::TrackerConfig`]
/// never collide this way unless two namespaces differ only in such characters.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory of the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_store_basic_operations() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get_item("k").unwrap(), None);

        store.set_item("k", "v1").unwrap();
        store.set_item("k", "v2").unwrap();
        assert_eq!(store.get_item("k").unwrap(), Some("v2".to_string()));
        assert_eq!(store.len(), 1);

        store.remove_item("k").unwrap();
        store.remove_item("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let mut store = MemoryStore::with_quota(10);
        store.set_item("ab", "12345678").unwrap();

        // Replacing the same key only counts the new value
        store.set_item("ab", "87654321").unwrap();

        let err = store.set_item("c", "1").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 12, limit: 10, .. }));
        assert_eq!(store.get_item("ab").unwrap(), Some("87654321".to_string()));
    }

    #[test]
    fn test_memory_store_outage() {
        let mut store = MemoryStore::new();
        store.set_item("k", "v").unwrap();
        store.set_unavailable(true);

        assert!(matches!(store.get_item("k"), Err(StorageError::Unavailable(_))));
        assert!(store.set_item("k", "w").is_err());

        store.set_unavailable(false);
        assert_eq!(store.get_item("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = FileStore::open(dir.path()).unwrap();
        store.set_item("hepple_log", "[]").unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_item("hepple_log").unwrap(), Some("[]".to_string()));
        assert_eq!(reopened.get_item("missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        store.set_item("../escape/attempt", "x").unwrap();
        assert!(dir.path().join("___escape_attempt.json").exists());
        assert_eq!(store.get_item("../escape/attempt").unwrap(), Some("x".to_string()));

        store.remove_item("../escape/attempt").unwrap();
        store.remove_item("../escape/attempt").unwrap();
        assert_eq!(store.get_item("../escape/attempt").unwrap(), None);
    }

    #[test]
    fn test_file_store_failed_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        // A directory in place of the target makes the rename fail
        fs::create_dir(dir.path().join("hepple_log.json")).unwrap();

        assert!(matches!(store.set_item("hepple_log", "[]"), Err(StorageError::Io(_))));
        assert!(!dir.path().join("hepple_log.json.tmp").exists());
    }

    #[test]
    fn test_file_store_keys_differing_in_punctuation_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();

        store.set_item("a.b", "dot").unwrap();
        store.set_item("a_b", "underscore").unwrap();
        assert_eq!(store.get_item("a.b").unwrap(), Some("underscore".to_string()));
    }
}
