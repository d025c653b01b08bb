//! Content-hash based analysis cache.
//!
//! Caches validated analyses so an unchanged job × candidate pair never
//! pays for a second model call within the TTL. Keys are derived from the
//! rendered candidate document only, so any edit to a job or a profile
//! produces a new key and the stale entry is simply never read again.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::models::CompatibilityAnalysis;
use crate::prompt::truncate_chars;
use store::{CacheStore, MemoryStore, StoreError};

/// Length of the hex key prefix kept from the SHA-256 digest.
pub const KEY_LEN: usize = 32;

/// Compute a cache key from the candidate document.
///
/// The document is cut to `char_limit` characters before hashing, using the
/// same truncation as the prompt builder. Documents from
/// [`crate::prompt::render_document`] already fit, so the cut only matters
/// for text rendered elsewhere.
pub fn cache_key(document: &str, char_limit: usize) -> String {
    let bounded = truncate_chars(document, char_limit);
    let mut hasher = Sha256::new();
    hasher.update(bounded.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

/// A cached analysis plus where and when it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub analysis: CompatibilityAnalysis,
    /// `provider:model` that produced the analysis.
    pub model: String,
    pub cached_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        self.cached_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

/// The fast cache layer in front of the model chain.
pub struct CacheEngine {
    enabled: bool,
    ttl: Duration,
    store: Arc<dyn CacheStore>,
}

impl CacheEngine {
    /// Create a cache engine over `store` with a fixed entry lifetime.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            store,
        }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: Duration::ZERO,
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry.
    ///
    /// Store failures, undecodable payloads and expired entries all read as
    /// a miss; the first two are logged.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                return None;
            }
        };
        if entry.key != key || entry.is_expired(Utc::now()) {
            return None;
        }
        Some(entry)
    }

    /// Write an analysis back without blocking the caller.
    ///
    /// The write runs on a detached task; failures are logged and never
    /// surface. The handle is returned for callers that want to wait, and
    /// is `None` when caching is disabled or no runtime is available.
    pub fn put(
        &self,
        key: &str,
        analysis: &CompatibilityAnalysis,
        model: &str,
    ) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let entry = self.entry(key, analysis, model);
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(key, "no async runtime, skipping cache write");
                return None;
            }
        };

        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        Some(handle.spawn(async move {
            if let Err(e) = write_entry(store.as_ref(), &entry, ttl).await {
                tracing::warn!(key = %entry.key, error = %e, "cache write failed");
            } else {
                tracing::debug!(key = %entry.key, "cached analysis");
            }
        }))
    }

    /// Write an analysis back and wait for the store.
    pub async fn put_and_wait(
        &self,
        key: &str,
        analysis: &CompatibilityAnalysis,
        model: &str,
    ) -> Result<(), StoreError> {
        if !self.enabled {
            return Ok(());
        }
        let entry = self.entry(key, analysis, model);
        write_entry(self.store.as_ref(), &entry, self.ttl).await
    }

    /// Drop a cached entry. Returns whether one existed.
    pub async fn invalidate(&self, key: &str) -> Result<bool, StoreError> {
        self.store.remove(key).await
    }

    fn entry(&self, key: &str, analysis: &CompatibilityAnalysis, model: &str) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            analysis: analysis.clone(),
            model: model.to_string(),
            cached_at: Utc::now(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

async fn write_entry(
    store: &dyn CacheStore,
    entry: &CacheEntry,
    ttl: Duration,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(entry).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    store.put(&entry.key, bytes, ttl).await
}
