//! Key-value persistence backends.
//!
//! The store only ever reads and writes whole values; that coarse
//! granularity is the locking discipline shared with other contexts.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Whole-value key-value persistence.
pub trait StorageBackend {
    /// Read the serialized value for `key`, or None if never written.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value for `key`.
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key under the platform config directory.
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Backend rooted at the default gemfold config directory.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_dir: default_data_dir()?,
        })
    }

    /// Backend rooted at an explicit directory (tests, embedding).
    pub fn with_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// File that backs the given key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        Ok(Some(contents))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create data directory: {}", self.base_dir.display())
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;
        Ok(())
    }
}

/// Directory holding persisted per-user state files.
pub fn default_data_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not find config directory")?;
    Ok(config_dir.join("gemfold"))
}

/// In-memory backend over a shared map.
///
/// Clones share the same map, so two stores built from clones see each
/// other's writes the way two tabs share one storage area. Used in
/// tests to exercise the last-writer-wins contract.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().expect("storage map poisoned");
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("storage map poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_clones_share_entries() {
        let a = MemoryBackend::new();
        let b = a.clone();

        a.write("k", "v1").unwrap();
        assert_eq!(b.read("k").unwrap().as_deref(), Some("v1"));

        b.write("k", "v2").unwrap();
        assert_eq!(a.read("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn file_backend_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::with_dir(dir.path().to_path_buf());

        assert!(backend.read("gemfold_data_default").unwrap().is_none());

        backend.write("gemfold_data_default", "{\"folders\":{}}").unwrap();
        assert_eq!(
            backend.read("gemfold_data_default").unwrap().as_deref(),
            Some("{\"folders\":{}}")
        );
        assert!(dir.path().join("gemfold_data_default.json").exists());
    }
}
