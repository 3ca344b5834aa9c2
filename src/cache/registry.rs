//! Namespaced, fail-soft cache client.
//!
//! [`CacheRegistry`] prefixes every key with a configured namespace and
//! serializes values as JSON. Transport and serialization failures never
//! reach the caller: a failed read is a miss, a failed write or delete
//! returns `false`. Cache unavailability therefore degrades to "no cache".

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{CacheStore, RedisStore};
use crate::error::CacheError;

/// Generic get/set/purge cache over a [`CacheStore`].
#[derive(Clone)]
pub struct CacheRegistry {
    store: Arc<dyn CacheStore>,
    key_prefix: String,
}

impl CacheRegistry {
    /// Create a registry over an arbitrary store.
    pub fn new(store: Arc<dyn CacheStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// Create a registry backed by Redis.
    ///
    /// Fails fast when `host` is empty. The connection itself is opened on
    /// the first operation.
    pub fn redis(
        host: &str,
        port: u16,
        password: Option<&str>,
        key_prefix: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let store = RedisStore::new(host, port, password)?;
        Ok(Self::new(Arc::new(store), key_prefix))
    }

    /// The namespace prepended to every key.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Read and deserialize the value stored under `key`.
    ///
    /// Returns `None` when the key is absent, the store is unreachable, or
    /// the stored value does not deserialize into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let key = self.build_key(key);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value could not be decoded, treating as miss");
                None
            }
        }
    }

    /// Serialize and store `value` under `key` for `ttl_secs` seconds.
    ///
    /// Returns `true` only if the store acknowledged the write.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        let key = self.build_key(key);

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Value could not be encoded for the cache");
                return false;
            }
        };

        match self.store.set_ex(&key, &raw, ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Delete `key`. Returns `true` if the command succeeded (including when
    /// the key did not exist).
    pub async fn purge(&self, key: &str) -> bool {
        let key = self.build_key(key);

        match self.store.del(&key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache purge failed");
                false
            }
        }
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}
