//! Cache store abstraction and the Redis-backed implementation.
//!
//! A [`CacheStore`] exposes the three commands the cache layer consumes:
//! `GET`, `SETEX` and `DEL`. Values travel as strings; serialization is the
//! registry's concern.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::CacheError;

/// Default Redis port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Key/value store with server-side expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl_secs` seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis implementation of [`CacheStore`].
///
/// The connection is opened lazily on the first command and then shared by
/// all later commands. A failed connect leaves the store unconnected so the
/// next command tries again.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    endpoint: String,
}

impl RedisStore {
    /// Create a store for the given server. No connection is made yet.
    ///
    /// Fails with [`CacheError::EmptyHost`] when `host` is empty.
    pub fn new(host: &str, port: u16, password: Option<&str>) -> Result<Self, CacheError> {
        if host.trim().is_empty() {
            return Err(CacheError::EmptyHost);
        }

        let url = redis_url(host, port, password);
        let client =
            redis::Client::open(url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            endpoint: format!("{}:{}", host, port),
        })
    }

    /// `host:port` of the Redis server.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                debug!(endpoint = %self.endpoint, "Connecting to Redis");
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| CacheError::Connection(e.to_string()))
            })
            .await?;

        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }
}

/// Build a `redis://` URL, percent-encoding the password.
fn redis_url(host: &str, port: u16, password: Option<&str>) -> String {
    match password.filter(|p| !p.is_empty()) {
        Some(password) => format!(
            "redis://:{}@{}:{}/",
            urlencoding::encode(password),
            host,
            port
        ),
        None => format!("redis://{}:{}/", host, port),
    }
}
