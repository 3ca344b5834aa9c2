//! Azure Blob Storage REST client.
//!
//! Talks to the Blob service directly over HTTPS with a bearer token issued
//! by Azure AD (`Authorization: Bearer <token>`). Only the operations the
//! manager needs are implemented:
//!
//! | Operation        | Request                                              |
//! |------------------|------------------------------------------------------|
//! | list containers  | `GET /?comp=list`                                    |
//! | create container | `PUT /{container}?restype=container`                 |
//! | list blobs       | `GET /{container}?restype=container&comp=list&prefix`|
//! | put blob         | `PUT /{container}/{blob}` (`x-ms-blob-type: BlockBlob`) |
//! | get blob         | `GET /{container}/{blob}`                            |
//!
//! List responses are paginated through `NextMarker`.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::backend::{BlobBackend, BlobConnector};
use super::connection::ConnectionString;
use crate::error::BlobError;

/// REST API version sent with every request. Bearer auth needs 2017-11-09+.
pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Blob service client authenticated with a bearer token.
#[derive(Clone)]
pub struct AzureBlobClient {
    http: reqwest::Client,
    endpoint: String,
    bearer_token: String,
}

impl AzureBlobClient {
    /// Create a client for `endpoint` (e.g. `https://acct.blob.core.windows.net`).
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Base URL of the blob service.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.bearer_token)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("x-ms-date", httpdate::fmt_http_date(SystemTime::now()))
    }

    fn container_url(&self, container: &str) -> String {
        format!("{}/{}", self.endpoint, urlencoding::encode(container))
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        format!(
            "{}/{}",
            self.container_url(container),
            urlencoding::encode(blob)
        )
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        resource: &str,
    ) -> Result<Response, BlobError> {
        let resp = request
            .send()
            .await
            .map_err(|e| BlobError::Http(format!("{} request failed: {}", operation, e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(resource.to_string()));
        }

        let body = resp.text().await.unwrap_or_default();
        Err(BlobError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    /// Run a paginated list request and collect the `<Name>` of every
    /// `entry` element.
    async fn list_all(
        &self,
        base_url: &str,
        entry: &str,
        operation: &'static str,
        resource: &str,
    ) -> Result<Vec<String>, BlobError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let url = match &marker {
                Some(m) => format!("{}&marker={}", base_url, urlencoding::encode(m)),
                None => base_url.to_string(),
            };

            let resp = self
                .send(self.request(Method::GET, &url), operation, resource)
                .await?;
            let body = resp
                .text()
                .await
                .map_err(|e| BlobError::Http(format!("{} body read failed: {}", operation, e)))?;

            names.extend(entry_names(&body, entry));

            match next_marker(&body) {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }
}

#[async_trait]
impl BlobBackend for AzureBlobClient {
    async fn list_containers(&self) -> Result<Vec<String>, BlobError> {
        let url = format!("{}/?comp=list", self.endpoint);
        self.list_all(&url, "Container", "list_containers", &self.endpoint)
            .await
    }

    async fn create_container(&self, container: &str) -> Result<(), BlobError> {
        let url = format!("{}?restype=container", self.container_url(container));
        let result = self
            .send(
                self.request(Method::PUT, &url).header("Content-Length", "0"),
                "create_container",
                container,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // ContainerAlreadyExists: another writer won the check-then-create race
            Err(BlobError::Status { status: 409, .. }) => {
                debug!(container, "Container already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn list_blobs(&self, container: &str, prefix: &str) -> Result<Vec<String>, BlobError> {
        let url = format!(
            "{}?restype=container&comp=list&prefix={}",
            self.container_url(container),
            urlencoding::encode(prefix)
        );
        self.list_all(&url, "Blob", "list_blobs", container).await
    }

    async fn put_block_blob(
        &self,
        container: &str,
        blob: &str,
        data: Bytes,
    ) -> Result<(), BlobError> {
        let url = self.blob_url(container, blob);
        let request = self
            .request(Method::PUT, &url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "application/octet-stream")
            .body(data);

        self.send(request, "put_blob", &format!("{}/{}", container, blob))
            .await?;
        Ok(())
    }

    async fn get_blob(&self, container: &str, blob: &str) -> Result<Bytes, BlobError> {
        let url = self.blob_url(container, blob);
        let resp = self
            .send(
                self.request(Method::GET, &url),
                "get_blob",
                &format!("{}/{}", container, blob),
            )
            .await?;

        resp.bytes()
            .await
            .map_err(|e| BlobError::Http(format!("get_blob body read failed: {}", e)))
    }
}

/// Builds [`AzureBlobClient`] sessions sharing one HTTP connection pool.
#[derive(Clone, Default)]
pub struct AzureConnector {
    http: reqwest::Client,
}

impl AzureConnector {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl BlobConnector for AzureConnector {
    fn connect(
        &self,
        connection_string: &str,
        bearer_token: &str,
    ) -> Result<Arc<dyn BlobBackend>, BlobError> {
        let cs = ConnectionString::parse(connection_string)?;
        let client = AzureBlobClient::new(self.http.clone(), cs.blob_endpoint(), bearer_token);
        debug!(endpoint = %client.endpoint(), "Blob storage client created");
        Ok(Arc::new(client))
    }
}

// =============================================================================
// List response parsing
// =============================================================================

/// `<Name>` of every `<entry>` element in a list response.
fn entry_names(body: &str, entry: &str) -> Vec<String> {
    let open = format!("<{}>", entry);
    let close = format!("</{}>", entry);

    let mut names = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        if let Some(name) = element_text(&after_open[..end], "Name") {
            names.push(name);
        }
        rest = &after_open[end + close.len()..];
    }

    names
}

/// Continuation marker, `None` when this is the last page.
fn next_marker(body: &str) -> Option<String> {
    element_text(body, "NextMarker").filter(|m| !m.is_empty())
}

/// Unescaped text of the first `<tag>...</tag>` in `xml`.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(unescape_xml(&xml[start..end]))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
