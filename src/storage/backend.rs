use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// Blob-storage operations consumed by the manager.
///
/// This abstraction keeps the manager independent of the wire protocol;
/// the Azure REST client and the in-memory store both implement it.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Names of all containers in the account.
    async fn list_containers(&self) -> Result<Vec<String>, BlobError>;

    /// Create a container. Creating one that already exists succeeds.
    async fn create_container(&self, container: &str) -> Result<(), BlobError>;

    /// Names of the blobs in `container` whose name starts with `prefix`.
    async fn list_blobs(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError>;

    /// Create or overwrite a block blob.
    async fn put_block_blob(&self, container: &str, blob: &str, data: Bytes)
        -> Result<(), BlobError>;

    /// Full content of a blob.
    async fn get_blob(&self, container: &str, blob: &str) -> Result<Bytes, BlobError>;
}

/// Builds a backend session from a connection string and a bearer token.
pub trait BlobConnector: Send + Sync {
    fn connect(
        &self,
        connection_string: &str,
        bearer_token: &str,
    ) -> Result<Arc<dyn BlobBackend>, BlobError>;
}
