//! Key/value storage for session state that must survive a reload.
//!
//! [`MemoryStore`] holds values for the lifetime of the process, matching
//! session-scoped browser storage. [`FileStore`] writes every mutation to a
//! JSON file so a restarted process can restore the session.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{SessionError, SessionResult};

/// String key/value store.
///
/// Implementations must be thread-safe.
pub trait KeyValueStore: Send + Sync {
    /// Gets a value.
    fn get(&self, key: &str) -> SessionResult<Option<String>>;

    /// Sets a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> SessionResult<()>;

    /// Removes a value. Succeeds if the key doesn't exist.
    fn remove(&self, key: &str) -> SessionResult<()>;

    /// Removes every value.
    fn clear(&self) -> SessionResult<()>;

    /// Lists the stored keys.
    fn keys(&self) -> SessionResult<Vec<String>>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn keys(&self) -> SessionResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// JSON file-backed store.
///
/// The whole map is kept in memory and rewritten on every mutation. Each
/// write goes to a temporary file that is renamed over the target.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing values if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> SessionResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| storage_error(&path, e))?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| storage_error(&path, e))?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the map, writes the copy, and only then
    /// swaps it in. A failed write leaves memory and disk on the old contents.
    fn update(
        &self,
        change: impl FnOnce(&mut HashMap<String, String>) -> bool,
    ) -> SessionResult<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    /// Writes `entries` to a temporary file next to the target and renames it
    /// into place.
    fn flush(&self, entries: &HashMap<String, String>) -> SessionResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| storage_error(&self.path, e))?;

        let content =
            serde_json::to_string_pretty(entries).map_err(|e| storage_error(&self.path, e))?;
        let mut file =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| storage_error(&self.path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| storage_error(&self.path, e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| storage_error(&self.path, e))?;
        file.persist(&self.path)
            .map_err(|e| storage_error(&self.path, e.error))?;
        Ok(())
    }
}

fn storage_error(path: &Path, error: impl std::fmt::Display) -> SessionError {
    SessionError::Storage(format!("{}: {error}", path.display()))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> SessionResult<()> {
        self.update(|entries| {
            entries.clear();
            true
        })
    }

    fn keys(&self) -> SessionResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("accessToken", "abc").unwrap();

        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get("missing").unwrap(), None);

        store.remove("accessToken").unwrap();
        store.remove("accessToken").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_store_clear() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.len(), 2);

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("tokens.json");

        let store = FileStore::open(&path).unwrap();
        store.set("refreshToken", "r-1").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("refreshToken").unwrap().as_deref(),
            Some("r-1")
        );
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn file_store_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileStore::open(&path).unwrap();
        store.set("idToken", "i-1").unwrap();
        store.clear().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.keys().unwrap().is_empty());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
    }

    #[test]
    fn file_store_failed_write_keeps_previous_values() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("session");
        let store = FileStore::open(session_dir.join("tokens.json")).unwrap();
        store.set("accessToken", "a-1").unwrap();

        // Replace the parent directory with a regular file so writes fail.
        std::fs::remove_dir_all(&session_dir).unwrap();
        std::fs::write(&session_dir, "").unwrap();

        let err = store.set("accessToken", "a-2").unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("a-1"));

        assert!(store.clear().is_err());
        assert_eq!(store.keys().unwrap(), vec!["accessToken".to_string()]);
    }

    #[test]
    fn file_store_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = FileStore::open(&path).unwrap();
        store.set("accessToken", "a-1").unwrap();
        store.set("refreshToken", "r-1").unwrap();
        store.remove("accessToken").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("tokens.json")]);
    }
}
