//! Credential persistence collaborators

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key-value persistence for provider credentials
pub trait CredentialStore: Send {
    /// The saved value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Save `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store; nothing outlives the session.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    entries: BTreeMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stores credentials as a flat JSON object on disk.
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename, so a failed write leaves the previous file intact.
#[derive(Debug)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileCredentialStore {
    /// Open (or lazily create) the store at `path`. A missing file is an
    /// empty store; an unreadable or malformed one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                Error::Persistence(format!("{} is not a credential file: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::Persistence(format!("Failed to serialize credentials: {}", e)))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                Error::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
            })
    }
}

impl CredentialStore for JsonFileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.write(&next)?;
        self.entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let mut store = JsonFileCredentialStore::open(&path).unwrap();
        assert_eq!(store.get("pixabay_api_key"), None);
        store.set("pixabay_api_key", "abc").unwrap();

        let reopened = JsonFileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.get("pixabay_api_key").as_deref(), Some("abc"));
    }

    #[test]
    fn malformed_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = JsonFileCredentialStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }
}
