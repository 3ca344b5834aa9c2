//! HTTP API tests: health, upload and render through the router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::test_utils::{TestHarness, CONTAINER};

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn upload_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn render_request() -> Request<Body> {
    Request::builder()
        .uri("/render")
        .body(Body::empty())
        .unwrap()
}

async fn upload(router: Router, image_base64: Value) -> (StatusCode, Value) {
    let body = json!({ "imageBase64": image_base64 }).to_string();
    send(router, upload_request(body)).await
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(harness.router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_render_before_upload_is_null() {
    let harness = TestHarness::new();

    let (status, body) = send(harness.router(), render_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "imageBase64": null }));
}

#[tokio::test]
async fn test_upload_then_render() {
    let harness = TestHarness::new();

    let (status, body) = upload(harness.router(), json!("aGVsbG8=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "errors": [], "code": 200 }));

    let (status, body) = send(harness.router(), render_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageBase64"], "aGVsbG8=");

    assert_eq!(harness.blobs.blob_count(CONTAINER).await, 1);
}

#[tokio::test]
async fn test_second_upload_replaces_first() {
    let harness = TestHarness::new();

    upload(harness.router(), json!("aGVsbG8=")).await;
    let (_, body) = send(harness.router(), render_request()).await;
    assert_eq!(body["imageBase64"], "aGVsbG8=");

    upload(harness.router(), json!("d29ybGQ=")).await;
    let (_, body) = send(harness.router(), render_request()).await;
    assert_eq!(body["imageBase64"], "d29ybGQ=");

    assert_eq!(harness.blobs.blob_count(CONTAINER).await, 1);
    assert_eq!(harness.blobs.container_count().await, 1);
}

#[tokio::test]
async fn test_upload_null_fails_both_rules() {
    let harness = TestHarness::new();

    let (status, body) = upload(harness.router(), Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 400);
    assert_eq!(
        body["errors"],
        json!([
            "The image base64 is required.",
            "The image base64 should be a valid string."
        ])
    );

    // Nothing reaches storage
    assert_eq!(harness.blobs.container_count().await, 0);
    assert_eq!(harness.provider.request_count(), 0);
}

#[tokio::test]
async fn test_upload_empty_string() {
    let harness = TestHarness::new();

    let (status, body) = upload(harness.router(), json!("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["The image base64 is required."]));
}

#[tokio::test]
async fn test_upload_non_string() {
    let harness = TestHarness::new();

    let (status, body) = upload(harness.router(), json!(12345)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        json!(["The image base64 should be a valid string."])
    );
}

#[tokio::test]
async fn test_upload_missing_field() {
    let harness = TestHarness::new();

    let (status, body) = send(harness.router(), upload_request(r#"{"other":"x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_malformed_body() {
    let harness = TestHarness::new();

    let (status, body) = send(harness.router(), upload_request("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_upload_storage_failure_is_generic_500() {
    let harness = TestHarness::new();
    harness.provider.set_failing(true);

    let (status, body) = upload(harness.router(), json!("aGVsbG8=")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 500);
    assert_eq!(
        body["errors"],
        json!(["There was an error uploading the image."])
    );
}

#[tokio::test]
async fn test_upload_invalid_base64_is_500() {
    let harness = TestHarness::new();

    let (status, body) = upload(harness.router(), json!("%%%")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_render_auth_failure_is_502() {
    let harness = TestHarness::new();
    harness.provider.set_failing(true);

    let (status, body) = send(harness.router(), render_request()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "authentication_error");
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn test_render_ambiguous_image_is_500() {
    let harness = TestHarness::new();
    harness
        .blobs
        .insert(CONTAINER, "my-image-general-images", "a")
        .await;
    harness.blobs.insert(CONTAINER, "my-image-old", "b").await;

    let (status, body) = send(harness.router(), render_request()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ambiguous_image");
}

#[tokio::test]
async fn test_cors_preflight() {
    let harness = TestHarness::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let harness = TestHarness::new();
    let request = Request::builder()
        .uri("/images/x")
        .body(Body::empty())
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
