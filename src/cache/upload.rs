//! Upload-specific cache: the identity-provider token and base64 payloads.

use tracing::{debug, info};

use super::registry::CacheRegistry;
use crate::error::UploadCacheError;

/// Domain prefix for every key written by [`UploadCache`].
const CACHE_PREFIX: &str = "upload_image";

/// Suffix of the key holding the identity-provider token.
const AUTH_TOKEN_SUFFIX: &str = "-azure_active_directory_token_key";

/// Default TTL for cached image payloads (1 hour).
pub const DEFAULT_IMAGE_TTL_SECS: u64 = 3600;

/// Cache for the authentication token and cached image payloads.
///
/// The token is stored with the TTL the identity provider reports; image
/// payloads use the TTL this cache was constructed with.
#[derive(Clone)]
pub struct UploadCache {
    registry: CacheRegistry,
    image_ttl_secs: u64,
}

impl UploadCache {
    pub fn new(registry: CacheRegistry, image_ttl_secs: u64) -> Self {
        Self {
            registry,
            image_ttl_secs,
        }
    }

    /// TTL applied to cached image payloads.
    pub fn image_ttl_secs(&self) -> u64 {
        self.image_ttl_secs
    }

    /// Cached token, or `None` on a miss (including an unreachable cache).
    pub async fn get_auth_token(&self) -> Option<String> {
        self.registry.get(&auth_token_key()).await
    }

    /// Store the token for `ttl_secs` seconds.
    ///
    /// Unlike the other writes this one is not best-effort: an unsaved token
    /// forces a round trip to the identity provider on every call.
    pub async fn save_auth_token(&self, token: &str, ttl_secs: u64) -> Result<(), UploadCacheError> {
        if !self.registry.set(&auth_token_key(), token, ttl_secs).await {
            return Err(UploadCacheError::SaveFailed {
                what: "the authentication token",
            });
        }
        debug!(ttl_secs, "Authentication token cached");
        Ok(())
    }

    /// Cached base64 payload for `img_id`.
    pub async fn get_image_base64(&self, img_id: &str) -> Result<String, UploadCacheError> {
        self.registry
            .get(&image_key(img_id))
            .await
            .ok_or_else(|| UploadCacheError::NotFound {
                img_id: img_id.to_string(),
            })
    }

    /// Cache the base64 payload for `img_id`. Best effort: returns whether
    /// the cache accepted the write.
    pub async fn save_image_base64(&self, img_id: &str, base64: &str) -> bool {
        self.registry
            .set(&image_key(img_id), base64, self.image_ttl_secs)
            .await
    }

    /// Remove the cached payload for `img_id`.
    ///
    /// Fails with `NotFound` if nothing is cached and with `PurgeFailed` if
    /// the delete itself fails.
    pub async fn remove_image_base64(&self, img_id: &str) -> Result<(), UploadCacheError> {
        let key = image_key(img_id);

        if self.registry.get::<String>(&key).await.is_none() {
            return Err(UploadCacheError::NotFound {
                img_id: img_id.to_string(),
            });
        }

        if !self.registry.purge(&key).await {
            return Err(UploadCacheError::PurgeFailed {
                img_id: img_id.to_string(),
            });
        }

        info!(img_id, "Cached image payload removed");
        Ok(())
    }

    /// Delete the cached payload for `img_id` whether or not one exists.
    ///
    /// Unlike [`remove_image_base64`](Self::remove_image_base64) there is no
    /// prior read, so an unreachable cache is reported as `PurgeFailed`
    /// instead of looking like an empty one.
    pub async fn discard_image_base64(&self, img_id: &str) -> Result<(), UploadCacheError> {
        if !self.registry.purge(&image_key(img_id)).await {
            return Err(UploadCacheError::PurgeFailed {
                img_id: img_id.to_string(),
            });
        }

        debug!(img_id, "Cached image payload discarded");
        Ok(())
    }
}

fn image_key(img_id: &str) -> String {
    format!("{}_{}", CACHE_PREFIX, img_id)
}

fn auth_token_key() -> String {
    format!("{}{}", CACHE_PREFIX, AUTH_TOKEN_SUFFIX)
}
