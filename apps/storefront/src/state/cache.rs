//! # Read-Through Cache
//!
//! Process-lifetime key/value cache with a TTL per entry, used by catalog
//! listings and profile/login lookups.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         TTL Cache                                       │
//! │                                                                         │
//! │  insert(key, value, ttl) ──► { value, expires_at = now + ttl }         │
//! │                                                                         │
//! │  get(key)                                                               │
//! │     ├── missing ─────────────────────► None                            │
//! │     ├── now <  expires_at ───────────► Some(value)                     │
//! │     └── now >= expires_at ── evict ──► None                            │
//! │                                                                         │
//! │  invalidate_prefix("games:") ──► drops every catalog listing           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Safety
//! Entries live behind a `Mutex`; the lock is never held across an
//! `.await`, so a slow loader never blocks other readers.
//!
//! No eviction under memory pressure and no persistence. Each process has
//! its own cache: with several storefront instances a catalog change is
//! only invalidated on the instance that made it, and the others catch up
//! when their TTL runs out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// TTL key/value cache. Values are stored as JSON so one cache can hold
/// listings, profiles and login records side by side.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live value for `key`, evicting it if expired.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            entries.remove(key);
            return None;
        }

        let entry = entries.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value has an unexpected shape, dropping it");
                entries.remove(key);
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl`.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                let entry = Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                };
                self.lock().insert(key, entry);
            }
            Err(e) => warn!(key = %key, error = %e, "Value could not be cached"),
        }
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Removes every key starting with `prefix`. Returns how many went.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();

        debug!(prefix = %prefix, removed, "Cache prefix invalidated");
        removed
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-through lookup: returns the cached value, or runs `load`,
    /// caches a successful result and returns it. Errors are not cached.
    ///
    /// Concurrent misses on the same key may each run `load`.
    pub async fn get_or_try_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }

        debug!(key = %key, "Cache miss");
        let value = load().await?;
        self.insert(key, &value, ttl);
        Ok(value)
    }
}
