//! Key-value persistence with file locking.
//!
//! The progress store and daily cache only need get/set/remove/list over
//! string values. [`FileKvStore`] keeps the whole map in one JSON document
//! and replaces it atomically on every write; [`MemoryKvStore`] is the
//! in-process stand-in used by tests.

use crate::{Error, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Durable string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All keys starting with `prefix`, sorted
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// JSON-document key-value store
pub struct FileKvStore {
    path: PathBuf,
}

impl FileKvStore {
    /// Create a store backed by the given file (created lazily on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Read the map with a shared lock
    ///
    /// A missing file is an empty store. A corrupted file logs a warning
    /// and also reads as empty, so the next write replaces it.
    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse store {:?}: {}. Treating as empty.",
                    self.path,
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    /// Atomically replace the map: temp file, sync, rename
    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Storage(format!("store path {:?} has no parent", self.path))
        })?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(map)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Load, modify and persist under an exclusive lock on the sidecar file
    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.load().and_then(|mut map| {
            f(&mut map);
            self.persist(&map)
        });

        lock.unlock()?;
        result
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })?;
        tracing::debug!("Stored key {} in {:?}", key, self.path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })?;
        tracing::debug!("Removed key {} from {:?}", key, self.path);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .into_keys()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a storage error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory store unavailable".into()));
        }
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("store.json");

        FileKvStore::new(&path).set("studyProgress:1", "{}").unwrap();

        let reopened = FileKvStore::new(&path);
        assert_eq!(
            reopened.get("studyProgress:1").unwrap(),
            Some("{}".to_string())
        );
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(temp_dir.path().join("nope.json"));

        assert_eq!(store.get("anything").unwrap(), None);
        assert!(store.list_keys("").unwrap().is_empty());
        store.remove("anything").unwrap();
    }

    #[test]
    fn test_file_store_corrupted_reads_as_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("store.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = FileKvStore::new(&path);
        assert_eq!(store.get("k").unwrap(), None);

        // Next write replaces the corrupted document
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_list_keys_filters_by_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(temp_dir.path().join("store.json"));

        store.set("studyProgress:a", "1").unwrap();
        store.set("studyProgress:b", "2").unwrap();
        store.set("challengeProgress:a", "3").unwrap();

        assert_eq!(
            store.list_keys("studyProgress:").unwrap(),
            vec!["studyProgress:a", "studyProgress:b"]
        );

        store.remove("studyProgress:a").unwrap();
        assert_eq!(store.list_keys("studyProgress:").unwrap(), vec!["studyProgress:b"]);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(temp_dir.path().join("store.json"));
        store.set("k", "v").unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n != "store.json" && n != "store.json.lock")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_memory_store_failure_switch() {
        let store = MemoryKvStore::new();
        store.set("k", "v").unwrap();

        store.set_failing(true);
        assert!(matches!(store.get("k"), Err(Error::Storage(_))));

        store.set_failing(false);
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }
}
