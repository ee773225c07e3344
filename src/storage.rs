//! Client-side key/value cache with per-entry expiry
//!
//! Values are JSON documents. Expired entries are evicted lazily on read.
//! When opened on a file, every mutation is written through to it.

use crate::errors::{Result, ShelfError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Expiring JSON store shared by the session and trick caches
#[derive(Debug, Default)]
pub struct TtlStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    path: Option<PathBuf>,
}

impl TtlStore {
    /// In-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by `path`. A missing file starts empty; an unreadable
    /// one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, Entry>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable storage file");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "storage opened");

        Ok(Self {
            entries: Mutex::new(entries),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw value under `key`, `None` when absent or expired
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!(key, "evicting expired entry");
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Typed value under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value`, expiring after `ttl` when given
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let expires_at = match ttl {
            Some(ttl) => {
                let out_of_range =
                    || ShelfError::StorageError(format!("TTL out of range: {:?}", ttl));
                let delta = chrono::Duration::from_std(ttl).map_err(|_| out_of_range())?;
                Some(Utc::now().checked_add_signed(delta).ok_or_else(out_of_range)?)
            }
            None => None,
        };
        self.insert(key, serde_json::to_value(value)?, expires_at)
    }

    /// Store `value` until the absolute instant `expires_at`
    pub fn set_until<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.insert(key, serde_json::to_value(value)?, Some(expires_at))
    }

    fn insert(&self, key: &str, value: Value, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), Entry { value, expires_at });
        debug!(key, ?expires_at, "entry stored");
        self.write_through(&entries)
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock();
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_through(&entries)?;
        }
        Ok(removed)
    }

    /// Remove everything
    pub fn flush(&self) -> Result<()> {
        let mut entries = self.lock();
        entries.clear();
        self.write_through(&entries)
    }

    /// Keys of live entries, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = Utc::now();
        self.lock()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remaining lifetime of `key`, `None` when absent or without expiry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Utc::now();
        let entries = self.lock();
        let at = entries.get(key)?.expires_at?;
        (at - now).to_std().ok()
    }

    /// Write the current contents to the backing file, if any
    pub fn persist(&self) -> Result<()> {
        let entries = self.lock();
        self.write_through(&entries)
    }

    fn write_through(&self, entries: &BTreeMap<String, Entry>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get() {
        let store = TtlStore::new();
        store.set("current_user", &json!({"username": "rin"}), None).unwrap();
        let user: Value = store.get("current_user").unwrap().unwrap();
        assert_eq!(user["username"], "rin");
        assert!(store.ttl("current_user").is_none());
    }

    #[test]
    fn test_oversized_ttl_is_an_error() {
        let store = TtlStore::new();
        let err = store
            .set("k", &1, Some(Duration::from_millis(10_000_000_000_000_000)))
            .unwrap_err();
        assert!(matches!(err, ShelfError::StorageError(_)));
        assert!(store.get_value("k").is_none());

        let err = store.set("k", &1, Some(Duration::MAX)).unwrap_err();
        assert!(matches!(err, ShelfError::StorageError(_)));
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = TtlStore::new();
        assert!(store.get::<Value>("nothing").unwrap().is_none());
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let store = TtlStore::new();
        let past = Utc::now() - chrono::Duration::seconds(5);
        store.set_until("stale", &1, past).unwrap();
        assert!(store.get_value("stale").is_none());
        assert!(store.keys().is_empty());
        assert!(!store.delete("stale").unwrap());
    }

    #[test]
    fn test_ttl_is_remaining_lifetime() {
        let store = TtlStore::new();
        store.set("k", &"v", Some(Duration::from_secs(60))).unwrap();
        let left = store.ttl("k").unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(55));
    }

    #[test]
    fn test_type_mismatch_is_serialization_error() {
        let store = TtlStore::new();
        store.set("n", &"not a number", None).unwrap();
        let err = store.get::<u32>("n").unwrap_err();
        assert!(matches!(err, ShelfError::SerializationError(_)));
    }

    #[test]
    fn test_delete_and_flush() {
        let store = TtlStore::new();
        store.set("a", &1, None).unwrap();
        store.set("b", &2, None).unwrap();
        assert_eq!(store.keys(), vec!["a", "b"]);
        assert!(store.delete("a").unwrap());
        assert_eq!(store.keys(), vec!["b"]);
        store.flush().unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("store.json");

        let store = TtlStore::open(&path).unwrap();
        store
            .set("tricks-by-rin", &json!({"tricks_count": 2}), Some(Duration::from_secs(600)))
            .unwrap();
        drop(store);

        let reopened = TtlStore::open(&path).unwrap();
        let value = reopened.get_value("tricks-by-rin").unwrap();
        assert_eq!(value["tricks_count"], 2);
        assert!(reopened.ttl("tricks-by-rin").is_some());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = TtlStore::open(&path).unwrap();
        assert!(store.keys().is_empty());
        store.set("k", &true, None).unwrap();
        let reopened = TtlStore::open(&path).unwrap();
        assert_eq!(reopened.get::<bool>("k").unwrap(), Some(true));
    }
}
