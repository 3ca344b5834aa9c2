//! Cache layer behaviour as seen by the service.

use std::sync::Arc;

use serde_json::json;

use blob_image_uploader::cache::{CacheRegistry, MemoryStore, UploadCache};
use blob_image_uploader::error::{CacheError, UploadCacheError};
use blob_image_uploader::service::IMAGE_ID;

use super::test_utils::{TestHarness, TrackingCacheStore, CACHE_PREFIX};

#[tokio::test]
async fn test_unreachable_cache_reads_as_miss() {
    let store = Arc::new(TrackingCacheStore::new());
    let registry = CacheRegistry::new(store.clone(), "app:");

    assert!(registry.set("key", &"value", 60).await);
    store.set_down(true);

    assert_eq!(registry.get::<String>("key").await, None);
    assert!(!registry.set("key", &"other", 60).await);
    assert!(!registry.purge("key").await);

    store.set_down(false);
    assert_eq!(registry.get::<String>("key").await.as_deref(), Some("value"));
}

#[tokio::test]
async fn test_registry_values_round_trip_as_json() {
    let store = Arc::new(TrackingCacheStore::new());
    let registry = CacheRegistry::new(store.clone(), "app:");

    assert!(registry.set("numbers", &vec![1, 2, 3], 60).await);
    assert_eq!(store.raw("app:numbers").await.as_deref(), Some("[1,2,3]"));
    assert_eq!(registry.get::<Vec<u32>>("numbers").await, Some(vec![1, 2, 3]));

    // Wrong type reads as a miss
    assert_eq!(registry.get::<String>("numbers").await, None);
}

#[test]
fn test_empty_redis_host_fails_fast() {
    let result = CacheRegistry::redis("", 6379, None, "app:");
    assert!(matches!(result, Err(CacheError::EmptyHost)));
}

#[tokio::test]
async fn test_upload_cache_image_lifecycle() {
    let cache = UploadCache::new(CacheRegistry::new(Arc::new(MemoryStore::new()), ""), 60);

    assert!(matches!(
        cache.get_image_base64(IMAGE_ID).await,
        Err(UploadCacheError::NotFound { .. })
    ));

    assert!(cache.save_image_base64(IMAGE_ID, "aGVsbG8=").await);
    assert_eq!(cache.get_image_base64(IMAGE_ID).await.unwrap(), "aGVsbG8=");

    cache.remove_image_base64(IMAGE_ID).await.unwrap();
    assert!(matches!(
        cache.remove_image_base64(IMAGE_ID).await,
        Err(UploadCacheError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_render_served_from_cache() {
    let harness = TestHarness::new();
    harness.service.upload_image(&json!("aGVsbG8=")).await;

    assert_eq!(
        harness.service.render_image().await.unwrap().as_deref(),
        Some("aGVsbG8=")
    );
    let key = format!("{}upload_image_{}", CACHE_PREFIX, IMAGE_ID);
    assert_eq!(harness.store.raw(&key).await.as_deref(), Some("\"aGVsbG8=\""));

    // Served from the cache even if storage changed underneath
    harness
        .blobs
        .insert("images", "my-image-general-images", "other")
        .await;
    assert_eq!(
        harness.service.render_image().await.unwrap().as_deref(),
        Some("aGVsbG8=")
    );
}

#[tokio::test]
async fn test_upload_invalidates_rendered_image() {
    let harness = TestHarness::new();

    harness.service.upload_image(&json!("aGVsbG8=")).await;
    harness.service.render_image().await.unwrap();
    let dels_before = harness.store.del_count();

    harness.service.upload_image(&json!("d29ybGQ=")).await;
    assert_eq!(harness.store.del_count(), dels_before + 1);
    assert_eq!(
        harness.service.render_image().await.unwrap().as_deref(),
        Some("d29ybGQ=")
    );
}

#[tokio::test]
async fn test_render_during_cache_outage() {
    let harness = TestHarness::new();
    harness.service.upload_image(&json!("aGVsbG8=")).await;

    // The cached token is unreachable, so a new one is requested and cannot be saved
    harness.store.set_down(true);
    assert!(harness.service.render_image().await.is_err());

    harness.store.set_down(false);
    assert_eq!(
        harness.service.render_image().await.unwrap().as_deref(),
        Some("aGVsbG8=")
    );
    assert!(harness.store.get_count() > 0);
}
