//! Token lifecycle and authenticated connections to blob storage.
//!
//! The authenticator moves between two states: unauthenticated, and
//! authenticated with the token a connection was built with. Each call to
//! [`BlobStorageAuthenticator::get_connection`] fetches the current token
//! (normally a cache hit) and compares it with the held token; a
//! different value means the cached token expired and was replaced, so the
//! connection is rebuilt. Expiry times are never inspected locally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::identity::IdentityProvider;
use super::token::AccessToken;
use crate::cache::UploadCache;
use crate::error::AuthError;
use crate::storage::{BlobConnector, Connection, ConnectionString};

/// Authentication state carried from one call to the next.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated {
        token: AccessToken,
        connection: Connection,
    },
}

impl AuthState {
    /// Connection held in this state, if any.
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Authenticated { connection, .. } => Some(connection),
        }
    }
}

/// Obtains tokens and hands out authenticated blob-storage connections.
///
/// Shared across requests through `Arc`. The state is guarded by an async
/// mutex so that fetch-compare-rebuild runs as one step.
pub struct BlobStorageAuthenticator {
    provider: Arc<dyn IdentityProvider>,
    connector: Arc<dyn BlobConnector>,
    cache: UploadCache,
    connection_string: String,
    state: Mutex<AuthState>,
    generation: AtomicU64,
}

impl BlobStorageAuthenticator {
    pub fn new(
        account: &ConnectionString,
        cache: UploadCache,
        provider: Arc<dyn IdentityProvider>,
        connector: Arc<dyn BlobConnector>,
    ) -> Self {
        Self {
            provider,
            connector,
            cache,
            connection_string: account.to_string(),
            state: Mutex::new(AuthState::Unauthenticated),
            generation: AtomicU64::new(0),
        }
    }

    /// Connection string used to build connections.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Ensure authentication and return the current connection.
    pub async fn get_connection(&self) -> Result<Connection, AuthError> {
        let mut state = self.state.lock().await;
        let (token, connection) = self.next_session(&state).await?;
        *state = AuthState::Authenticated {
            token,
            connection: connection.clone(),
        };
        Ok(connection)
    }

    /// Compute the next state from `current`.
    ///
    /// Unauthenticated: fetch a token and build a connection. Authenticated:
    /// fetch the token again and rebuild the connection only if the value
    /// changed.
    pub async fn authenticate(&self, current: &AuthState) -> Result<AuthState, AuthError> {
        let (token, connection) = self.next_session(current).await?;
        Ok(AuthState::Authenticated { token, connection })
    }

    async fn next_session(&self, current: &AuthState) -> Result<(AccessToken, Connection), AuthError> {
        let token = self.get_auth_token().await?;

        let connection = match current {
            AuthState::Authenticated {
                token: held,
                connection,
            } if *held == token => {
                debug!(connection = connection.id(), "Token unchanged, reusing connection");
                connection.clone()
            }
            AuthState::Authenticated { connection, .. } => {
                info!(previous = connection.id(), "Token rotated, rebuilding connection");
                self.open_connection(&token)?
            }
            AuthState::Unauthenticated => self.open_connection(&token)?,
        };

        Ok((token, connection))
    }

    /// Current access token: cached if available, otherwise freshly issued
    /// by the identity provider and cached for its lifetime.
    pub async fn get_auth_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cache.get_auth_token().await {
            debug!("Using cached access token");
            return Ok(AccessToken::new(token));
        }

        let response = self.provider.request_token().await?;

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Protocol("missing access_token".to_string()))?;
        let expires_in = response
            .expires_in
            .filter(|e| *e > 0)
            .ok_or_else(|| AuthError::Protocol("missing expires_in".to_string()))?;

        self.cache.save_auth_token(&token, expires_in).await?;
        info!(expires_in, "Obtained new access token");

        Ok(AccessToken::with_expiry(token, Duration::from_secs(expires_in)))
    }

    fn open_connection(&self, token: &AccessToken) -> Result<Connection, AuthError> {
        let backend = self
            .connector
            .connect(&self.connection_string, token.secret())?;
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(connection = id, "Blob storage connection established");

        Ok(Connection::new(id, backend))
    }
}
