// Key/value persistence backends for the credential store

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// String key/value storage (the role `localStorage` plays in a browser)
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage, lost on exit
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, one file for all keys
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove {}", self.path.display()))?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write to a sibling file first so a crash never leaves half a document
        let tmp = self.path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard();
        let mut entries = self.read_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable credential file");
            BTreeMap::new()
        });
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard();
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Removing unreadable credential file");
                BTreeMap::new()
            }
        };
        entries.remove(key);
        self.write_all(&entries)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").unwrap().is_none());

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));

        storage.remove("k").unwrap();
        assert!(storage.get("k").unwrap().is_none());
        assert!(storage.is_empty());

        // Removing a missing key is fine
        storage.remove("k").unwrap();
    }

    #[test]
    fn test_memory_storage_clones_share_entries() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        let storage = FileStorage::new(path.clone());

        assert!(storage.get("a").unwrap().is_none());
        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();
        assert!(path.exists());

        let reopened = FileStorage::new(path.clone());
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_storage_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let storage = FileStorage::new(path.clone());

        storage.set("a", "1").unwrap();
        storage.remove("a").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(path.clone());
        assert!(storage.get("a").is_err());

        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
    }
}
