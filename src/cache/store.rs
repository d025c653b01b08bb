//! Byte-oriented cache stores.
//!
//! The engine treats its store as opaque bytes in, bytes out, with a
//! per-entry TTL. [`FileStore`] persists entries as JSON envelopes in
//! `~/.config/fitscore/cache/`; [`MemoryStore`] keeps them in-process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value storage with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite an entry that expires `ttl` from now.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Delete an entry. Returns whether one existed.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// On-disk representation of one entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    expires_at: DateTime<Utc>,
    /// Base64 of the stored bytes.
    value: String,
}

/// Filesystem-based cache store.
pub struct FileStore {
    cache_dir: Option<PathBuf>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// Create a new file store using the default cache directory.
    pub fn new() -> Self {
        let cache_dir =
            dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("cache"));
        Self { cache_dir }
    }

    /// Create a file store with a specific cache directory.
    pub fn new_with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir: Some(cache_dir),
        }
    }

    /// Remove all cached entries.
    pub fn clear(&self) -> Result<CacheStats, std::io::Error> {
        let stats = self.stats();
        if let Some(ref dir) = self.cache_dir {
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        stats
    }

    /// Compute statistics about the cache.
    pub fn stats(&self) -> Result<CacheStats, std::io::Error> {
        let Some(ref dir) = self.cache_dir else {
            return Ok(CacheStats::default());
        };
        if !dir.exists() {
            return Ok(CacheStats::default());
        }

        let mut stats = CacheStats::default();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                stats.entries += 1;
                stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(stats)
    }

    /// Return the cache directory path.
    pub fn path(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    /// Get the file path for a cache key.
    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let dir = self
            .cache_dir
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("cache directory could not be determined".into()))?;
        Ok(dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.key_path(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if envelope.expires_at <= Utc::now() {
            // Best-effort purge; a concurrent writer may already have replaced it.
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        BASE64
            .decode(envelope.value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let envelope = Envelope {
            expires_at: expiry_from_now(ttl),
            value: BASE64.encode(value),
        };
        let content =
            serde_json::to_string(&envelope).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Write-then-rename so readers never observe a half-written entry.
        // Each write gets its own tmp file; the last rename wins.
        let tmp = tmp_path(&path);
        if let Err(e) = tokio::fs::write(&tmp, content).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Sibling of `path` unique to this process and write.
fn tmp_path(path: &std::path::Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// In-process cache store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, DateTime<Utc>)>>, StoreError>
    {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Utc::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.lock()?
            .insert(key.to_string(), (value, expiry_from_now(ttl)));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }
}

/// Statistics about the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Total size in bytes.
    pub total_bytes: u64,
}

impl CacheStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;

        if self.total_bytes >= MB {
            format!("{:.1} MiB", self.total_bytes as f64 / MB as f64)
        } else if self.total_bytes >= KB {
            format!("{:.1} KiB", self.total_bytes as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[tokio::test]
    async fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());

        store.put("abc123", b"payload".to_vec(), DAY).await.unwrap();
        assert_eq!(store.get("abc123").await.unwrap(), Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn file_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_expired_entry_reads_as_missing_and_is_purged() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());

        store.put("old", b"x".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(!dir.path().join("old.json").exists());
    }

    #[tokio::test]
    async fn file_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());

        store.put("k", b"first".to_vec(), DAY).await.unwrap();
        store.put("k", b"second".to_vec(), DAY).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.stats().unwrap().entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writes_to_one_key_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new_with_dir(dir.path().to_path_buf()));

        let writers: Vec<_> = (0..64u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.put("samekey", vec![i], DAY).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let value = store.get("samekey").await.unwrap().unwrap();
        assert_eq!(value.len(), 1);
        assert!(value[0] < 64);
        assert_eq!(store.stats().unwrap().entries, 1);
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn tmp_paths_are_unique_siblings() {
        let path = PathBuf::from("/cache/abc.json");
        let a = tmp_path(&path);
        let b = tmp_path(&path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("abc.json."));
        assert!(name.ends_with(".tmp"));
    }

    #[tokio::test]
    async fn file_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());

        store.put("k", b"v".to_vec(), DAY).await.unwrap();
        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());
        assert!(matches!(store.get("bad").await, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn file_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new_with_dir(dir.path().to_path_buf());
        let err = store.put("../escape", b"v".to_vec(), DAY).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn file_without_dir_is_unavailable() {
        let store = FileStore { cache_dir: None };
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let store = FileStore::new_with_dir(cache_dir.clone());
        assert_eq!(store.stats().unwrap(), CacheStats::default());

        store.put("key1", b"one".to_vec(), DAY).await.unwrap();
        store.put("key2", b"two".to_vec(), DAY).await.unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_bytes > 0);

        let cleared = store.clear().unwrap();
        assert_eq!(cleared.entries, 2);
        assert!(!cache_dir.exists());
    }

    #[tokio::test]
    async fn memory_roundtrip_and_expiry() {
        let store = MemoryStore::new();
        store.put("live", b"1".to_vec(), DAY).await.unwrap();
        store.put("dead", b"2".to_vec(), Duration::ZERO).await.unwrap();

        assert_eq!(store.get("live").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("dead").await.unwrap(), None);
        assert_eq!(store.len(), 1);
        assert!(store.remove("live").await.unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn human_size_units() {
        let bytes = CacheStats { entries: 1, total_bytes: 500 };
        assert_eq!(bytes.human_size(), "500 B");
        let kib = CacheStats { entries: 1, total_bytes: 2048 };
        assert_eq!(kib.human_size(), "2.0 KiB");
        let mib = CacheStats { entries: 1, total_bytes: 2 * 1024 * 1024 };
        assert_eq!(mib.human_size(), "2.0 MiB");
    }
}
