use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Family names are opaque ASCII strings; each family is an independent
/// keyspace. Reads are soft (missing → `None`); writes must be durable
/// before the next read in the same logical operation observes them.
pub trait KeyValueStore: Send + Sync {
    fn put(&self, family: &str, key: &str, value: &str) -> Result<(), KvError>;
    fn get(&self, family: &str, key: &str) -> Result<Option<String>, KvError>;
    fn delete(&self, family: &str, key: &str) -> Result<(), KvError>;
    fn delete_subtree(&self, family: &str) -> Result<(), KvError>;
    /// Enumerates the keys stored in `family`. Used by the index's reverse
    /// family to support URL enumeration and LRU eviction.
    fn list_keys(&self, family: &str) -> Result<Vec<String>, KvError>;
}

#[derive(Debug, Error)]
pub enum KvError {
    #[error("io error in key-value store: {0}")]
    Io(#[from] std::io::Error),
}

/// Default `KeyValueStore` implementation: each family is a directory and
/// each key a file within it holding the value verbatim. This follows the
/// content-addressed cache-directory idiom already used elsewhere in this
/// codebase rather than introducing a new embedded-database dependency.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn family_dir(&self, family: &str) -> PathBuf {
        self.root.join(sanitize(family))
    }

    fn key_path(&self, family: &str, key: &str) -> PathBuf {
        self.family_dir(family).join(sanitize(key))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn put(&self, family: &str, key: &str, value: &str) -> Result<(), KvError> {
        let dir = self.family_dir(family);
        fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!(".{}.tmp", sanitize(key)));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.key_path(family, key))?;
        Ok(())
    }

    fn get(&self, family: &str, key: &str) -> Result<Option<String>, KvError> {
        match fs::read_to_string(self.key_path(family, key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, family: &str, key: &str) -> Result<(), KvError> {
        match fs::remove_file(self.key_path(family, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_subtree(&self, family: &str) -> Result<(), KvError> {
        match fs::remove_dir_all(self.family_dir(family)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self, family: &str) -> Result<Vec<String>, KvError> {
        let dir = self.family_dir(family);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }
}

/// Family/key names double as path components; reject path traversal and
/// separators rather than silently escaping the store root.
fn sanitize(component: &str) -> String {
    component.replace(['/', '\\', '\0'], "_")
}
