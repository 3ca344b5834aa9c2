//! In-process cache store.
//!
//! Used for local development (`--cache-backend memory`) and in tests.
//! Entries expire after their TTL and the store keeps at most a fixed number
//! of entries, evicting the least recently used one first.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::store::CacheStore;
use crate::error::CacheError;

/// Default maximum number of entries.
pub const DEFAULT_MEMORY_STORE_ENTRIES: usize = 1024;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// LRU-bounded, TTL-aware in-memory [`CacheStore`].
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryStore {
    /// Create a store with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_STORE_ENTRIES)
    }

    /// Create a store holding at most `max_entries` entries (minimum 1).
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries.iter().filter(|(_, e)| e.expires_at > now).count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        // Redis rejects SETEX with a zero TTL; mirror that.
        if ttl_secs == 0 {
            return Err(CacheError::Command(
                "invalid expire time in 'setex' command".to_string(),
            ));
        }

        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.pop(key);
        Ok(())
    }
}
