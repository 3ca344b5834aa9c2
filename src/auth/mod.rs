//! Identity-provider tokens and authenticated blob-storage connections.
//!
//! - [`IdentityProvider`]: source of fresh tokens ([`AzureAdProvider`] talks
//!   to the Azure AD v2.0 token endpoint)
//! - [`BlobStorageAuthenticator`]: caches tokens through the
//!   [`UploadCache`](crate::cache::UploadCache) and rebuilds the connection
//!   when the token changes

mod authenticator;
mod identity;
mod token;

pub use authenticator::{AuthState, BlobStorageAuthenticator};
pub use identity::{
    AzureAdProvider, ClientCredentials, IdentityProvider, TokenResponse,
    DEFAULT_IDENTITY_BASE_URL, DEFAULT_IDENTITY_TIMEOUT_SECS, DEFAULT_STORAGE_SCOPE,
};
pub use token::AccessToken;
