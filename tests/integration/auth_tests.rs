//! Token caching and connection lifecycle across requests.

use std::time::Duration;

use serde_json::json;

use blob_image_uploader::error::{AuthError, StorageError};
use blob_image_uploader::service::IMAGE_ID;

use super::test_utils::{TestHarness, TrackingProvider, CACHE_PREFIX};

const TOKEN_KEY: &str = "upload_image-azure_active_directory_token_key";

#[tokio::test]
async fn test_token_fetched_once_across_requests() {
    let harness = TestHarness::new();

    for _ in 0..3 {
        let outcome = harness.service.upload_image(&json!("aGVsbG8=")).await;
        assert!(outcome.success);
    }
    harness.service.render_image().await.unwrap();

    assert_eq!(harness.provider.request_count(), 1);
    assert_eq!(harness.connector.connect_count(), 1);
}

#[tokio::test]
async fn test_token_stored_under_prefixed_key_as_json() {
    let harness = TestHarness::new();
    harness.authenticator.get_connection().await.unwrap();

    let raw = harness
        .store
        .raw(&format!("{}{}", CACHE_PREFIX, TOKEN_KEY))
        .await;
    assert_eq!(raw.as_deref(), Some("\"token-1\""));
}

#[tokio::test]
async fn test_rotation_rebuilds_connection_once() {
    let harness = TestHarness::new();

    let first = harness.authenticator.get_connection().await.unwrap();

    // Another process refreshed the token in the shared cache
    harness.cache.save_auth_token("token-2", 3599).await.unwrap();

    let second = harness.authenticator.get_connection().await.unwrap();
    let third = harness.authenticator.get_connection().await.unwrap();

    assert!(!first.same_session(&second));
    assert!(second.same_session(&third));
    assert_eq!(harness.connector.connect_count(), 2);
    assert_eq!(harness.connector.last_token().as_deref(), Some("token-2"));
    assert_eq!(harness.provider.request_count(), 1);
}

#[tokio::test]
async fn test_expired_token_is_refetched() {
    let harness = TestHarness::with_provider(TrackingProvider::new(&["token-1", "token-2"], 1));

    let first = harness.authenticator.get_connection().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let second = harness.authenticator.get_connection().await.unwrap();

    assert_eq!(harness.provider.request_count(), 2);
    assert!(!first.same_session(&second));
    assert_eq!(harness.connector.last_token().as_deref(), Some("token-2"));
}

#[tokio::test]
async fn test_same_token_after_expiry_keeps_connection() {
    // The provider re-issues an identical value
    let harness = TestHarness::with_provider(TrackingProvider::new(&["token-1"], 1));

    let first = harness.authenticator.get_connection().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let second = harness.authenticator.get_connection().await.unwrap();

    assert_eq!(harness.provider.request_count(), 2);
    assert!(first.same_session(&second));
    assert_eq!(harness.connector.connect_count(), 1);
}

#[tokio::test]
async fn test_missing_expires_in_caches_nothing() {
    let harness = TestHarness::with_provider(TrackingProvider::without_expiry("token-1"));

    let result = harness.authenticator.get_auth_token().await;
    assert!(matches!(result, Err(AuthError::Protocol(_))));
    assert_eq!(harness.store.set_count(), 0);
    assert_eq!(harness.cache.get_auth_token().await, None);
}

#[tokio::test]
async fn test_unreachable_cache_fails_token_save() {
    let harness = TestHarness::new();
    harness.store.set_down(true);

    let result = harness.authenticator.get_connection().await;
    assert!(matches!(result, Err(AuthError::TokenCache(_))));
    assert_eq!(harness.provider.request_count(), 1);
    assert_eq!(harness.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_cache_outage_recovers() {
    let harness = TestHarness::new();
    harness.store.set_down(true);
    assert!(harness.authenticator.get_connection().await.is_err());

    harness.store.set_down(false);
    assert!(harness.authenticator.get_connection().await.is_ok());
    assert_eq!(harness.provider.request_count(), 2);
}

#[tokio::test]
async fn test_provider_failure_surfaces_as_storage_auth_error() {
    let harness = TestHarness::new();
    harness.provider.set_failing(true);

    let manager = harness.service.manager();
    let err = manager.get_image(IMAGE_ID).await.unwrap_err();
    assert!(matches!(err, StorageError::Auth(AuthError::Transport(_))));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_connection() {
    let harness = TestHarness::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let auth = harness.authenticator.clone();
            tokio::spawn(async move { auth.get_connection().await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(harness.provider.request_count(), 1);
    assert_eq!(harness.connector.connect_count(), 1);
}
