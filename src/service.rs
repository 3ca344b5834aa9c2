//! Upload and render operations exposed to the HTTP layer and the CLI.
//!
//! [`ImageService`] validates the payload, builds a request-scoped
//! [`BlobStorageManager`] and keeps the rendered payload in the
//! [`UploadCache`] until the next upload replaces it.
//!
//! Every successful upload bumps an in-process upload generation before it
//! clears the cached payload. A render only caches what it read if the
//! generation it started under is still current, so a render that raced an
//! upload can never refill the cache with the replaced image.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::BlobStorageAuthenticator;
use crate::cache::UploadCache;
use crate::error::StorageError;
use crate::storage::BlobStorageManager;
use crate::validation::UploadValidator;

/// The single well-known image identifier.
pub const IMAGE_ID: &str = "my-image";

/// Error reported to the client when a valid upload could not be stored.
pub const UPLOAD_FAILED_MESSAGE: &str = "There was an error uploading the image.";

/// Result of an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub errors: Vec<String>,
    /// HTTP status code describing the outcome (200, 400 or 500).
    pub code: u16,
}

impl UploadOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            code: 200,
        }
    }

    fn invalid(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            code: 400,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            errors: vec![UPLOAD_FAILED_MESSAGE.to_string()],
            code: 500,
        }
    }
}

/// Facade over validation, storage and the render cache.
pub struct ImageService {
    authenticator: Arc<BlobStorageAuthenticator>,
    cache: UploadCache,
    container: String,
    cache_dir: PathBuf,
    validator: UploadValidator,
    upload_generation: Mutex<u64>,
}

impl ImageService {
    pub fn new(
        authenticator: Arc<BlobStorageAuthenticator>,
        cache: UploadCache,
        container: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            authenticator,
            cache,
            container: container.into(),
            cache_dir: cache_dir.into(),
            validator: UploadValidator::new(),
            upload_generation: Mutex::new(0),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// A fresh manager for one request.
    pub fn manager(&self) -> BlobStorageManager {
        BlobStorageManager::new(
            Arc::clone(&self.authenticator),
            self.container.clone(),
            &self.cache_dir,
        )
    }

    /// Validate `payload` and, if valid, store it as the image.
    ///
    /// Invalid payloads are never uploaded. Storage failures are logged and
    /// reported as a generic error with code 500.
    pub async fn upload_image(&self, payload: &Value) -> UploadOutcome {
        let validation = self.validator.validate(payload);
        let image_base64 = match payload.as_str() {
            Some(s) if validation.valid => s,
            _ => {
                debug!(errors = ?validation.errors, "Upload payload rejected");
                return UploadOutcome::invalid(validation.errors);
            }
        };

        if let Err(e) = self.manager().upload_image(IMAGE_ID, image_base64).await {
            error!(error = %e, cause = ?std::error::Error::source(&e), "Error uploading the image to blob storage");
            return UploadOutcome::failed();
        }

        *self.upload_generation.lock().await += 1;
        self.invalidate_rendered().await;
        info!(img_id = IMAGE_ID, "A new image has been uploaded to blob storage");
        UploadOutcome::ok()
    }

    /// The stored image as base64, or `None` if nothing has been uploaded.
    pub async fn render_image(&self) -> Result<Option<String>, StorageError> {
        if let Ok(cached) = self.cache.get_image_base64(IMAGE_ID).await {
            debug!(img_id = IMAGE_ID, "Rendering cached image");
            return Ok(Some(cached));
        }

        let started_under = *self.upload_generation.lock().await;
        let image = self.manager().find_image(IMAGE_ID).await?;

        if let Some(base64) = &image {
            // Held across the save so an upload cannot bump in between
            let generation = self.upload_generation.lock().await;
            if *generation != started_under {
                debug!(img_id = IMAGE_ID, "Upload finished during render, not caching");
            } else if !self.cache.save_image_base64(IMAGE_ID, base64).await {
                debug!(img_id = IMAGE_ID, "Rendered image not cached");
            }
        }
        Ok(image)
    }

    async fn invalidate_rendered(&self) {
        if let Err(e) = self.cache.discard_image_base64(IMAGE_ID).await {
            warn!(error = %e, "Stale rendered image left in cache");
        }
    }
}
