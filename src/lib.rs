//! # Blob Image Uploader
//!
//! Upload a single image (as base64) to an Azure Blob Storage account and
//! render it back.
//!
//! Access to the storage account uses Azure AD tokens obtained with the
//! client-credentials grant. Tokens are cached in Redis for their reported
//! lifetime, and the blob connection is rebuilt whenever the cached token
//! changes.
//!
//! ## Architecture
//!
//! - [`cache`] - Cache store (Redis or in-process), fail-soft registry, upload cache
//! - [`auth`] - Identity provider client and the blob storage authenticator
//! - [`storage`] - Blob backends (Azure REST, in-memory) and the storage manager
//! - [`validation`] - Upload payload validation
//! - [`service`] - Upload and render operations
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blob_image_uploader::{
//!     AzureAdProvider, AzureConnector, BlobStorageAuthenticator, CacheRegistry,
//!     ClientCredentials, ConnectionString, ImageService, UploadCache,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = UploadCache::new(CacheRegistry::redis("localhost", 6379, None, "")?, 3600);
//! let provider = AzureAdProvider::new(
//!     "https://login.microsoftonline.com/",
//!     ClientCredentials {
//!         tenant_id: "tenant".into(),
//!         client_id: "client".into(),
//!         client_secret: "secret".into(),
//!         scope: "https://storage.azure.com/.default".into(),
//!     },
//!     std::time::Duration::from_secs(30),
//! )?;
//! let authenticator = BlobStorageAuthenticator::new(
//!     &ConnectionString::new("https", "myaccount"),
//!     cache.clone(),
//!     Arc::new(provider),
//!     Arc::new(AzureConnector::default()),
//! );
//! let service = ImageService::new(Arc::new(authenticator), cache, "images", "/tmp/uploader");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use auth::{
    AccessToken, AuthState, AzureAdProvider, BlobStorageAuthenticator, ClientCredentials,
    IdentityProvider, TokenResponse,
};
pub use cache::{CacheRegistry, CacheStore, MemoryStore, RedisStore, UploadCache};
pub use config::{CacheBackend, CacheConfig, CheckConfig, Cli, Command, ServeConfig, StorageConfig};
pub use error::{AuthError, BlobError, CacheError, StorageError, UploadCacheError};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use service::{ImageService, UploadOutcome, IMAGE_ID};
pub use storage::{
    AzureBlobClient, AzureConnector, BlobBackend, BlobConnector, BlobStorageManager, Connection,
    ConnectionString, MemoryBlobStore, MemoryConnector,
};
pub use validation::{UploadValidator, ValidationResult};
