use std::fs;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::digest::digest;
use crate::kvstore::KeyValueStore;

/// Family name for the reverse (`url -> digest`) mapping.
const REVERSE_FAMILY: &str = "STIR_SHAKEN";

/// Persistent binding of public-key URL to {local path, expiry}. Built atop
/// a generic `KeyValueStore` so the family/key/value primitive can be
/// swapped in tests.
pub struct KeyIndex {
    store: Arc<dyn KeyValueStore>,
}

impl KeyIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes `digest -> path` and `STIR_SHAKEN/url -> digest`. Does not
    /// set expiration.
    pub fn put(&self, url: &str, path: &str) {
        let d = digest(url);
        if let Err(e) = self.store.put(&d, "path", path) {
            warn!(url, error = %e, "failed to persist key path");
        }
        if let Err(e) = self.store.put(REVERSE_FAMILY, url, &d) {
            warn!(url, error = %e, "failed to persist reverse index entry");
        }
    }

    /// Empty string when absent; never fails.
    pub fn get_path(&self, url: &str) -> String {
        let d = digest(url);
        self.store
            .get(&d, "path")
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub fn set_expiration(&self, url: &str, abs_seconds: u64) {
        let d = digest(url);
        if let Err(e) = self.store.put(&d, "expiration", &abs_seconds.to_string()) {
            warn!(url, error = %e, "failed to persist expiration");
        }
    }

    /// 0 signals "no value or unparseable".
    pub fn get_expiration(&self, url: &str) -> u64 {
        let d = digest(url);
        self.store
            .get(&d, "expiration")
            .ok()
            .flatten()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Deletes the reverse mapping, the entire per-digest subtree, and —
    /// best-effort — unlinks the file named in `path` before deletion.
    /// Missing file is not an error.
    pub fn remove(&self, url: &str) {
        let path = self.get_path(url);
        if !path.is_empty()
            && let Err(e) = fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(url, path, error = %e, "failed to unlink cached key file");
        }
        let d = digest(url);
        if let Err(e) = self.store.delete(REVERSE_FAMILY, url) {
            warn!(url, error = %e, "failed to delete reverse index entry");
        }
        if let Err(e) = self.store.delete_subtree(&d) {
            warn!(url, error = %e, "failed to delete per-digest subtree");
        }
        debug!(url, "removed key index entry");
    }

    /// Enumerates the reverse family. Supports admin inspection and the
    /// LRU eviction bound in the key cache manager.
    pub fn list_urls(&self) -> Vec<String> {
        self.store.list_keys(REVERSE_FAMILY).unwrap_or_default()
    }
}
