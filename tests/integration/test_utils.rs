//! Test utilities for integration tests.
//!
//! Mock identity provider and cache store with request tracking, plus a
//! harness that wires the whole service over in-memory backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use blob_image_uploader::auth::{BlobStorageAuthenticator, IdentityProvider, TokenResponse};
use blob_image_uploader::cache::{CacheRegistry, CacheStore, MemoryStore, UploadCache};
use blob_image_uploader::error::{AuthError, CacheError};
use blob_image_uploader::server::{create_router, RouterConfig};
use blob_image_uploader::service::ImageService;
use blob_image_uploader::storage::{ConnectionString, MemoryBlobStore, MemoryConnector};

pub const CONTAINER: &str = "images";
pub const CACHE_PREFIX: &str = "test:";

// =============================================================================
// Mock Identity Provider with Request Tracking
// =============================================================================

/// Identity provider handing out tokens from a queue.
///
/// The last token is repeated once the queue runs dry. When configured to
/// fail, every call returns a transport error.
pub struct TrackingProvider {
    tokens: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    expires_in: Option<u64>,
    fail: AtomicBool,
    request_count: AtomicUsize,
}

impl TrackingProvider {
    pub fn new(tokens: &[&str], expires_in: u64) -> Self {
        Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            last: Mutex::new(None),
            expires_in: Some(expires_in),
            fail: AtomicBool::new(false),
            request_count: AtomicUsize::new(0),
        }
    }

    /// Provider whose responses lack `expires_in`.
    pub fn without_expiry(token: &str) -> Self {
        Self {
            expires_in: None,
            ..Self::new(&[token], 0)
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn next_token(&self) -> Option<String> {
        let mut last = self.last.lock().unwrap();
        if let Some(token) = self.tokens.lock().unwrap().pop_front() {
            *last = Some(token);
        }
        last.clone()
    }
}

#[async_trait]
impl IdentityProvider for TrackingProvider {
    async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::Transport("connection refused".to_string()));
        }

        Ok(TokenResponse {
            access_token: self.next_token(),
            expires_in: self.expires_in,
        })
    }
}

// =============================================================================
// Tracking Cache Store
// =============================================================================

/// In-memory cache store that counts commands and can simulate an outage.
pub struct TrackingCacheStore {
    inner: MemoryStore,
    down: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
    dels: AtomicUsize,
}

impl TrackingCacheStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            down: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            dels: AtomicUsize::new(0),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn del_count(&self) -> usize {
        self.dels.load(Ordering::SeqCst)
    }

    /// Raw value under the full (prefixed) key, bypassing tracking.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.ok().flatten()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for TrackingCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set_ex(key, value, ttl_secs).await
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.dels.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.del(key).await
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Fully wired service over in-memory backends.
pub struct TestHarness {
    pub blobs: Arc<MemoryBlobStore>,
    pub connector: Arc<MemoryConnector>,
    pub provider: Arc<TrackingProvider>,
    pub store: Arc<TrackingCacheStore>,
    pub cache: UploadCache,
    pub authenticator: Arc<BlobStorageAuthenticator>,
    pub service: Arc<ImageService>,
    pub cache_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_provider(TrackingProvider::new(&["token-1"], 3599))
    }

    pub fn with_provider(provider: TrackingProvider) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        let connector = Arc::new(MemoryConnector::new(blobs.clone()));
        let provider = Arc::new(provider);
        let store = Arc::new(TrackingCacheStore::new());
        let cache = UploadCache::new(CacheRegistry::new(store.clone(), CACHE_PREFIX), 3600);

        let authenticator = Arc::new(BlobStorageAuthenticator::new(
            &ConnectionString::new("https", "testaccount"),
            cache.clone(),
            provider.clone(),
            connector.clone(),
        ));

        let cache_dir = tempfile::tempdir().unwrap();
        let service = Arc::new(ImageService::new(
            authenticator.clone(),
            cache.clone(),
            CONTAINER,
            cache_dir.path(),
        ));

        Self {
            blobs,
            connector,
            provider,
            store,
            cache,
            authenticator,
            service,
            cache_dir,
        }
    }

    /// Router without request tracing.
    pub fn router(&self) -> Router {
        create_router(
            self.service.clone(),
            RouterConfig::new().with_tracing(false),
        )
    }
}
