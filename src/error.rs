use thiserror::Error;

/// Errors raised by a cache store backend.
///
/// The [`CacheRegistry`](crate::cache::CacheRegistry) converts every variant
/// except [`CacheError::EmptyHost`] into a cache miss.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache host was not configured
    #[error("Cache host cannot be empty")]
    EmptyHost,

    /// Could not open a connection to the cache server
    #[error("Unable to connect to cache server: {0}")]
    Connection(String),

    /// A cache command failed after the connection was established
    #[error("Cache command failed: {0}")]
    Command(String),

    /// A value could not be serialized or deserialized
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Errors from the upload-specific cache.
#[derive(Debug, Clone, Error)]
pub enum UploadCacheError {
    /// No entry stored under the derived key
    #[error("Unable to load the image base64 value for image {img_id}")]
    NotFound { img_id: String },

    /// The underlying cache refused to store a value
    #[error("Error saving {what} into the cache")]
    SaveFailed { what: &'static str },

    /// The underlying cache failed to delete an entry
    #[error("Unable to remove the base64 image for image {img_id}")]
    PurgeFailed { img_id: String },
}

/// Errors raised while authenticating against the identity provider.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token endpoint could not be reached or answered with an error status
    #[error("Unable to authenticate the security principal on the identity provider: {0}")]
    Transport(String),

    /// The token endpoint answered but the body is not a valid token response
    #[error("Invalid token response from the identity provider: {0}")]
    Protocol(String),

    /// A freshly issued token could not be cached
    #[error("Token cache error: {0}")]
    TokenCache(#[from] UploadCacheError),

    /// The blob-storage connection could not be built from the token
    #[error("Unable to build blob storage connection: {0}")]
    Connection(#[from] BlobError),
}

/// Errors returned by a blob-storage backend.
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    /// Network or transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("Blob service returned HTTP {status} during {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Container or blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The connection string is missing a required setting
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Local filesystem failure while staging blob content
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io(err.to_string())
    }
}

/// Errors surfaced by the [`BlobStorageManager`](crate::storage::BlobStorageManager).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The configured container does not exist yet
    #[error("Container {container} is not defined")]
    ContainerNotFound { container: String },

    /// No blob matches the image identifier
    #[error("There is no image identified by {img_id}")]
    ImageNotFound { img_id: String },

    /// More than one blob matches the image identifier
    #[error("There are {count} images identified by {img_id}")]
    AmbiguousImage { img_id: String, count: usize },

    /// Could not obtain an authenticated connection
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Backend failure outside the download and upload sequences
    #[error("Blob storage error: {0}")]
    Backend(#[from] BlobError),

    /// Failure while downloading or staging the image
    #[error("Unable to obtain the image identified by {img_id}")]
    Download {
        img_id: String,
        #[source]
        source: BlobError,
    },

    /// Failure anywhere in the upload sequence
    #[error("Unable to upload the image {img_id} to blob storage")]
    Upload {
        img_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Whether this error means "nothing uploaded yet" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ContainerNotFound { .. } | StorageError::ImageNotFound { .. }
        )
    }
}
