//! Connection strings and authenticated connection handles.

use std::fmt;
use std::sync::Arc;

use super::backend::BlobBackend;
use crate::error::BlobError;

/// Default protocol used to reach the storage account.
pub const DEFAULT_PROTOCOL: &str = "https";

/// Public Azure blob endpoint suffix.
const BLOB_ENDPOINT_SUFFIX: &str = "blob.core.windows.net";

/// Storage account connection settings.
///
/// Rendered as `DefaultEndpointsProtocol=<protocol>;AccountName=<account>;`,
/// optionally followed by `BlobEndpoint=<url>;` when the blob endpoint is
/// overridden (for example when running against the Azurite emulator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub protocol: String,
    pub account_name: String,
    pub blob_endpoint: Option<String>,
}

impl ConnectionString {
    pub fn new(protocol: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            account_name: account_name.into(),
            blob_endpoint: None,
        }
    }

    /// Override the blob endpoint URL.
    pub fn with_blob_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.blob_endpoint = Some(endpoint.into());
        self
    }

    /// Parse a `key=value;` connection string.
    ///
    /// `AccountName` is required; `DefaultEndpointsProtocol` defaults to
    /// https. Unknown keys are ignored.
    pub fn parse(s: &str) -> Result<Self, BlobError> {
        let mut protocol = None;
        let mut account_name = None;
        let mut blob_endpoint = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(BlobError::InvalidConnectionString(format!(
                    "malformed segment '{}'",
                    part
                )));
            };
            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = Some(value.trim().to_string()),
                "AccountName" => account_name = Some(value.trim().to_string()),
                "BlobEndpoint" => blob_endpoint = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let account_name = account_name
            .filter(|a| !a.is_empty())
            .ok_or_else(|| BlobError::InvalidConnectionString("missing AccountName".to_string()))?;

        Ok(Self {
            protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            account_name,
            blob_endpoint,
        })
    }

    /// Base URL of the blob service, without a trailing slash.
    pub fn blob_endpoint(&self) -> String {
        match &self.blob_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}.{}",
                self.protocol, self.account_name, BLOB_ENDPOINT_SUFFIX
            ),
        }
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DefaultEndpointsProtocol={};AccountName={};",
            self.protocol, self.account_name
        )?;
        if let Some(endpoint) = &self.blob_endpoint {
            write!(f, "BlobEndpoint={};", endpoint)?;
        }
        Ok(())
    }
}

/// Authenticated session with the blob backend.
///
/// Cheap to clone. Every handle built by the authenticator carries a new
/// `id`, so a rebuilt connection is observable as an id change.
#[derive(Clone)]
pub struct Connection {
    id: u64,
    backend: Arc<dyn BlobBackend>,
}

impl Connection {
    pub fn new(id: u64, backend: Arc<dyn BlobBackend>) -> Self {
        Self { id, backend }
    }

    /// Generation id of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    /// Whether both handles refer to the same backend session.
    pub fn same_session(&self, other: &Connection) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}
