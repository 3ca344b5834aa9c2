//! Blob storage access.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           BlobStorageManager             │
//! │  (get/upload image, container, staging)  │
//! └────────────────────┬─────────────────────┘
//!                      │ Connection
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │        BlobBackend (trait object)        │
//! └──────────┬─────────────────────┬─────────┘
//!            ▼                     ▼
//! ┌────────────────────┐  ┌────────────────────┐
//! │  AzureBlobClient   │  │  MemoryBlobStore   │
//! │  (REST + bearer)   │  │   (in-process)     │
//! └────────────────────┘  └────────────────────┘
//! ```
//!
//! Connections are produced by a [`BlobConnector`] from a connection string
//! and a bearer token; the authenticator decides when to build a new one.

mod azure;
mod backend;
mod connection;
mod manager;
mod memory;

pub use azure::{AzureBlobClient, AzureConnector, AZURE_API_VERSION};
pub use backend::{BlobBackend, BlobConnector};
pub use connection::{Connection, ConnectionString, DEFAULT_PROTOCOL};
pub use manager::{BlobStorageManager, BLOB_NAME_SUFFIX, STAGING_DIR_NAME};
// Test and development backend
pub use memory::{MemoryBlobStore, MemoryConnector};
