//! Local session cache for the token-wrapped master key.
//!
//! The cache is a single-slot key-value store addressed by a fixed tag.
//! Every failure (missing file, unreadable file, permission denied,
//! corrupted JSON) surfaces as `StorageUnavailable` or `Ok(None)`, and the
//! manager treats both as a cache miss.  Nothing here is ever fatal.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PmVaultError, Result};
use crate::vault::format::write_atomic;

/// Tag under which the session-encrypted master key is cached.
pub const MASTER_KEY_CACHE_TAG: &str = "pmvault_masterkey";

/// A device-scoped string store.
pub trait SessionCache: Send + Sync {
    /// Read the value stored under `tag`, if any.
    fn load(&self, tag: &str) -> Result<Option<String>>;

    /// Store `value` under `tag`, replacing any previous value.
    fn store(&self, tag: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `tag`.  Removing a missing entry is
    /// not an error.
    fn clear(&self, tag: &str) -> Result<()>;
}

impl<T: SessionCache + ?Sized> SessionCache for Arc<T> {
    fn load(&self, tag: &str) -> Result<Option<String>> {
        (**self).load(tag)
    }

    fn store(&self, tag: &str, value: &str) -> Result<()> {
        (**self).store(tag, value)
    }

    fn clear(&self, tag: &str) -> Result<()> {
        (**self).clear(tag)
    }
}

impl<T: SessionCache + ?Sized> SessionCache for Box<T> {
    fn load(&self, tag: &str) -> Result<Option<String>> {
        (**self).load(tag)
    }

    fn store(&self, tag: &str, value: &str) -> Result<()> {
        (**self).store(tag, value)
    }

    fn clear(&self, tag: &str) -> Result<()> {
        (**self).clear(tag)
    }
}

// ---------------------------------------------------------------------------
// In-memory cache
// ---------------------------------------------------------------------------

/// Process-local cache, for tests and for hosts with no persistent
/// device storage.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PmVaultError::StorageUnavailable("session cache lock poisoned".into()))
    }
}

impl SessionCache for MemorySessionCache {
    fn load(&self, tag: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(tag).cloned())
    }

    fn store(&self, tag: &str, value: &str) -> Result<()> {
        self.entries()?.insert(tag.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, tag: &str) -> Result<()> {
        self.entries()?.remove(tag);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed cache
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    value: String,
    stored_at: DateTime<Utc>,
}

/// JSON file cache, written atomically with owner-only permissions.
///
/// With a `max_age`, entries older than that are reported as absent
/// (and the next `store` overwrites them).
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
    max_age: Option<Duration>,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_age: None,
        }
    }

    /// Expire entries older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CacheFile> {
        if !self.path.exists() {
            return Ok(CacheFile::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            PmVaultError::StorageUnavailable(format!("cannot read {}: {e}", self.path.display()))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            PmVaultError::StorageUnavailable(format!("corrupted {}: {e}", self.path.display()))
        })
    }

    fn write(&self, file: &CacheFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| PmVaultError::StorageUnavailable(format!("serialize cache: {e}")))?;

        write_atomic(&self.path, &bytes).map_err(|e| {
            PmVaultError::StorageUnavailable(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        match self.max_age {
            Some(max_age) => Utc::now() - entry.stored_at > max_age,
            None => false,
        }
    }
}

impl SessionCache for FileSessionCache {
    fn load(&self, tag: &str) -> Result<Option<String>> {
        let file = self.read()?;
        match file.entries.get(tag) {
            Some(entry) if self.is_expired(entry) => {
                debug!(tag, stored_at = %entry.stored_at, "session cache entry expired");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn store(&self, tag: &str, value: &str) -> Result<()> {
        // A corrupted cache file is simply replaced.
        let mut file = self.read().unwrap_or_default();
        file.entries.insert(
            tag.to_string(),
            CacheEntry {
                value: value.to_string(),
                stored_at: Utc::now(),
            },
        );
        self.write(&file)
    }

    fn clear(&self, tag: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut file = self.read().unwrap_or_default();
        file.entries.remove(tag);
        self.write(&file)
    }
}

// ---------------------------------------------------------------------------
// OS keyring cache
// ---------------------------------------------------------------------------

/// Cache backed by the OS credential store (see `crate::keyring`).
#[cfg(feature = "keyring-store")]
#[derive(Debug, Clone)]
pub struct KeyringSessionCache {
    scope: String,
}

#[cfg(feature = "keyring-store")]
impl KeyringSessionCache {
    /// `scope` separates vaults that share one OS account, e.g. the
    /// vault directory path.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    fn entry_id(&self, tag: &str) -> String {
        format!("{}:{tag}", self.scope)
    }
}

#[cfg(feature = "keyring-store")]
impl SessionCache for KeyringSessionCache {
    fn load(&self, tag: &str) -> Result<Option<String>> {
        crate::keyring::get_secret(&self.entry_id(tag))
    }

    fn store(&self, tag: &str, value: &str) -> Result<()> {
        crate::keyring::store_secret(&self.entry_id(tag), value)
    }

    fn clear(&self, tag: &str) -> Result<()> {
        crate::keyring::delete_secret(&self.entry_id(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_cache_is_last_writer_wins() {
        let cache = MemorySessionCache::new();
        assert_eq!(cache.load("slot").unwrap(), None);

        cache.store("slot", "first").unwrap();
        cache.store("slot", "second").unwrap();
        assert_eq!(cache.load("slot").unwrap().as_deref(), Some("second"));

        cache.clear("slot").unwrap();
        assert_eq!(cache.load("slot").unwrap(), None);
    }

    #[test]
    fn file_cache_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        FileSessionCache::new(&path).store("slot", "value").unwrap();
        let reopened = FileSessionCache::new(&path);
        assert_eq!(reopened.load("slot").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn file_cache_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = FileSessionCache::new(dir.path().join("nope.json"));
        assert_eq!(cache.load("slot").unwrap(), None);
        assert!(cache.clear("slot").is_ok());
    }

    #[test]
    fn file_cache_corruption_is_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{{ not json").unwrap();

        let cache = FileSessionCache::new(&path);
        assert!(matches!(
            cache.load("slot"),
            Err(PmVaultError::StorageUnavailable(_))
        ));

        // Storing over a corrupted file repairs it.
        cache.store("slot", "fresh").unwrap();
        assert_eq!(cache.load("slot").unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn file_cache_expires_old_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let stale = CacheFile {
            entries: HashMap::from([(
                "slot".to_string(),
                CacheEntry {
                    value: "old".to_string(),
                    stored_at: Utc::now() - Duration::hours(2),
                },
            )]),
        };
        fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let no_limit = FileSessionCache::new(&path);
        assert_eq!(no_limit.load("slot").unwrap().as_deref(), Some("old"));

        let one_hour = FileSessionCache::new(&path).with_max_age(Duration::hours(1));
        assert_eq!(one_hour.load("slot").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn file_cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        FileSessionCache::new(&path).store("slot", "value").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
