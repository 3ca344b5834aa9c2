//! HTTP request handlers for the image upload API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /upload` - Upload the image as base64
//! - `GET /render` - Fetch the stored image as base64

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{AuthError, StorageError};
use crate::service::{ImageService, UploadOutcome};

/// Field of the upload body holding the image.
pub const IMAGE_FIELD: &str = "imageBase64";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the image service.
#[derive(Clone)]
pub struct AppState {
    pub image_service: Arc<ImageService>,
}

impl AppState {
    pub fn new(image_service: ImageService) -> Self {
        Self {
            image_service: Arc::new(image_service),
        }
    }

    pub fn from_shared(image_service: Arc<ImageService>) -> Self {
        Self { image_service }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "authentication_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Render response. `imageBase64` is `null` until an image is uploaded.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    #[serde(rename = "imageBase64")]
    pub image_base64: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert StorageError to HTTP response.
///
/// Upstream failures (identity provider, blob service) map to 502, local
/// ones to 500. Server errors are logged at ERROR, client errors at WARN.
impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            StorageError::ContainerNotFound { .. } | StorageError::ImageNotFound { .. } => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            StorageError::AmbiguousImage { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ambiguous_image")
            }
            StorageError::Auth(AuthError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, "authentication_error")
            }
            StorageError::Auth(_) => (StatusCode::INTERNAL_SERVER_ERROR, "authentication_error"),
            StorageError::Backend(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
            StorageError::Download { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "download_error"),
            StorageError::Upload { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "upload_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                cause = ?std::error::Error::source(&self),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type = error_type, "Resource not found: {}", message);
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle upload requests.
///
/// # Endpoint
///
/// `POST /upload` with body `{"imageBase64": "<base64>"}`
///
/// # Response
///
/// The [`UploadOutcome`] as JSON, with its `code` as the HTTP status:
/// 200 on success, 400 when validation fails, 500 when storage fails.
/// A missing or unparsable body is validated as an absent value.
pub async fn upload_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<UploadOutcome>) {
    let payload = match body {
        Ok(Json(mut body)) => body
            .get_mut(IMAGE_FIELD)
            .map(Value::take)
            .unwrap_or(Value::Null),
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Upload body is not JSON");
            Value::Null
        }
    };

    let outcome = state.image_service.upload_image(&payload).await;
    let status = StatusCode::from_u16(outcome.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(outcome))
}

/// Handle render requests.
///
/// `GET /render` returns `{"imageBase64": "<base64>"}`, or
/// `{"imageBase64": null}` when nothing has been uploaded yet.
pub async fn render_handler(
    State(state): State<AppState>,
) -> Result<Json<RenderResponse>, StorageError> {
    let image_base64 = state.image_service.render_image().await?;
    Ok(Json(RenderResponse { image_base64 }))
}
