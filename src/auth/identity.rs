//! Identity provider client (OAuth 2.0 client-credentials grant).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::debug;
use url::Url;

use crate::error::AuthError;

/// Base URL of the Azure AD token service.
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://login.microsoftonline.com/";

/// Scope requesting the permissions granted to the app on Azure Storage.
pub const DEFAULT_STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Default timeout for token requests.
pub const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 30;

/// Body of a token endpoint response.
///
/// Both fields are optional here; the authenticator decides whether the
/// response is usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,

    /// Lifetime in seconds. Accepts a JSON number or a numeric string.
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<u64>,
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Source of access tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Request a new token from the provider.
    ///
    /// Fails with [`AuthError::Transport`] when the provider cannot be
    /// reached or rejects the request, and with [`AuthError::Protocol`]
    /// when the body is not JSON.
    async fn request_token(&self) -> Result<TokenResponse, AuthError>;
}

/// Client credentials for the token endpoint.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

/// Azure AD v2.0 token endpoint client.
pub struct AzureAdProvider {
    http: reqwest::Client,
    token_url: Url,
    credentials: ClientCredentials,
}

impl AzureAdProvider {
    /// Create a provider for `{base_url}{tenant}/oauth2/v2.0/token`.
    pub fn new(
        base_url: &str,
        credentials: ClientCredentials,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let token_url = token_url(base_url, &credentials.tenant_id)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_url,
            credentials,
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    fn form_params(&self) -> [(&'static str, &str); 4] {
        [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("scope", self.credentials.scope.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ]
    }
}

#[async_trait]
impl IdentityProvider for AzureAdProvider {
    async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        debug!(url = %self.token_url, "Requesting access token");

        let resp = self
            .http
            .get(self.token_url.clone())
            .form(&self.form_params())
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("response is not valid JSON: {}", e)))
    }
}

fn token_url(base_url: &str, tenant_id: &str) -> Result<Url, AuthError> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };

    Url::parse(&base)
        .and_then(|base| base.join(&format!("{}/oauth2/v2.0/token", tenant_id)))
        .map_err(|e| AuthError::Transport(format!("invalid identity provider URL: {}", e)))
}
