//! In-memory blob backend for tests and development.
//!
//! Behaves like the blob service for the operations the manager uses:
//! containers are created idempotently, listing filters by name prefix and
//! writes overwrite. The binary always talks to Azure; these types exist so
//! the service can be driven end to end without a storage account, and
//! [`MemoryConnector`] records sessions and bearer tokens for assertions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::backend::{BlobBackend, BlobConnector};
use super::connection::ConnectionString;
use crate::error::BlobError;

/// Shared in-memory blob store, for tests and development. The binary
/// never wires it in.
#[derive(Default)]
pub struct MemoryBlobStore {
    containers: RwLock<BTreeMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a blob directly, creating its container if needed.
    pub async fn insert(&self, container: &str, blob: &str, data: impl Into<Bytes>) {
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .insert(blob.to_string(), data.into());
    }

    /// Number of containers.
    pub async fn container_count(&self) -> usize {
        self.containers.read().await.len()
    }

    /// Number of blobs in `container` (0 if it does not exist).
    pub async fn blob_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .await
            .get(container)
            .map(|blobs| blobs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobStore {
    async fn list_containers(&self) -> Result<Vec<String>, BlobError> {
        Ok(self.containers.read().await.keys().cloned().collect())
    }

    async fn create_container(&self, container: &str) -> Result<(), BlobError> {
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn list_blobs(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| BlobError::NotFound(container.to_string()))?;

        Ok(blobs
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put_block_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
    ) -> Result<(), BlobError> {
        let mut containers = self.containers.write().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| BlobError::NotFound(container.to_string()))?;
        blobs.insert(blob.to_string(), data);
        Ok(())
    }

    async fn get_blob(&self, container: &str, blob: &str) -> Result<Bytes, BlobError> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|blobs| blobs.get(blob))
            .cloned()
            .ok_or_else(|| BlobError::NotFound(format!("{}/{}", container, blob)))
    }
}

/// Connector that hands out sessions over one shared [`MemoryBlobStore`].
///
/// Records how many sessions were opened and the last bearer token used.
pub struct MemoryConnector {
    store: Arc<MemoryBlobStore>,
    connects: AtomicUsize,
    last_token: std::sync::Mutex<Option<String>>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryBlobStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
            last_token: std::sync::Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<MemoryBlobStore> {
        &self.store
    }

    /// Number of sessions opened so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Bearer token of the most recent session.
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().ok().and_then(|t| t.clone())
    }
}

impl BlobConnector for MemoryConnector {
    fn connect(
        &self,
        connection_string: &str,
        bearer_token: &str,
    ) -> Result<Arc<dyn BlobBackend>, BlobError> {
        ConnectionString::parse(connection_string)?;

        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_token.lock() {
            *last = Some(bearer_token.to_string());
        }

        // Each session is a distinct handle over the same data.
        Ok(Arc::new(MemorySession(Arc::clone(&self.store))))
    }
}

/// One session over a shared store.
struct MemorySession(Arc<MemoryBlobStore>);

#[async_trait]
impl BlobBackend for MemorySession {
    async fn list_containers(&self) -> Result<Vec<String>, BlobError> {
        self.0.list_containers().await
    }

    async fn create_container(&self, container: &str) -> Result<(), BlobError> {
        self.0.create_container(container).await
    }

    async fn list_blobs(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        self.0.list_blobs(container, prefix).await
    }

    async fn put_block_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
    ) -> Result<(), BlobError> {
        self.0.put_block_blob(container, blob, data).await
    }

    async fn get_blob(&self, container: &str, blob: &str) -> Result<Bytes, BlobError> {
        self.0.get_blob(container, blob).await
    }
}
