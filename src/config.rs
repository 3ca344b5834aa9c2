//! Configuration management.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `UPLOADER_` prefix. Two subcommands are available:
//!
//! - `serve` - run the HTTP server
//! - `check` - verify the configuration against the live services
//!
//! # Environment Variables
//!
//! - `UPLOADER_HOST` - Server bind address (default: 0.0.0.0)
//! - `UPLOADER_PORT` - Server port (default: 3000)
//! - `UPLOADER_CACHE_DIR` - Directory for staged downloads (default: system temp dir)
//! - `UPLOADER_STORAGE_ACCOUNT` - Storage account name (required)
//! - `UPLOADER_STORAGE_PROTOCOL` - Protocol for the blob endpoint (default: https)
//! - `UPLOADER_BLOB_ENDPOINT` - Blob endpoint override (e.g. Azurite)
//! - `UPLOADER_CONTAINER` - Container holding the image (required)
//! - `UPLOADER_TENANT_ID` / `UPLOADER_CLIENT_ID` / `UPLOADER_CLIENT_SECRET` - Azure AD app (required)
//! - `UPLOADER_IDENTITY_URL` - Token service base URL
//! - `UPLOADER_SCOPE` - Token scope (default: https://storage.azure.com/.default)
//! - `UPLOADER_CACHE_BACKEND` - `redis` or `memory` (default: redis)
//! - `UPLOADER_REDIS_HOST` / `UPLOADER_REDIS_PORT` / `UPLOADER_REDIS_PASSWORD` - Redis server
//! - `UPLOADER_CACHE_PREFIX` - Namespace prepended to cache keys
//! - `UPLOADER_IMAGE_CACHE_TTL` - TTL for the cached rendered image (default: 3600)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::auth::{
    ClientCredentials, DEFAULT_IDENTITY_BASE_URL, DEFAULT_IDENTITY_TIMEOUT_SECS,
    DEFAULT_STORAGE_SCOPE,
};
use crate::cache::{
    CacheRegistry, MemoryStore, DEFAULT_IMAGE_TTL_SECS, DEFAULT_MEMORY_STORE_ENTRIES,
    DEFAULT_REDIS_PORT,
};
use crate::error::CacheError;
use crate::storage::{ConnectionString, DEFAULT_PROTOCOL};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Sub-directory of the system temp dir used when no cache dir is given.
pub const DEFAULT_CACHE_DIR_NAME: &str = "blob-image-uploader";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Blob Image Uploader - upload an image to Azure Blob Storage and render it back.
#[derive(Parser, Debug, Clone)]
#[command(name = "blob-image-uploader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Check configuration and connectivity, then exit.
    Check(CheckConfig),
}

/// Which cache store backs the token and image cache.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Shared Redis server.
    #[default]
    Redis,
    /// In-process store; tokens are lost on restart.
    Memory,
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Storage account and identity settings.
#[derive(Args, Debug, Clone)]
pub struct StorageConfig {
    /// Storage account name.
    #[arg(long, env = "UPLOADER_STORAGE_ACCOUNT")]
    pub storage_account: String,

    /// Protocol used to reach the blob endpoint.
    #[arg(long, default_value = DEFAULT_PROTOCOL, env = "UPLOADER_STORAGE_PROTOCOL")]
    pub storage_protocol: String,

    /// Blob endpoint override, for example an Azurite emulator URL.
    #[arg(long, env = "UPLOADER_BLOB_ENDPOINT")]
    pub blob_endpoint: Option<String>,

    /// Container holding the uploaded image.
    #[arg(long, env = "UPLOADER_CONTAINER")]
    pub container: String,

    /// Azure AD tenant id.
    #[arg(long, env = "UPLOADER_TENANT_ID")]
    pub tenant_id: String,

    /// Azure AD application (client) id.
    #[arg(long, env = "UPLOADER_CLIENT_ID")]
    pub client_id: String,

    /// Azure AD client secret.
    #[arg(long, env = "UPLOADER_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Base URL of the token service.
    #[arg(long, default_value = DEFAULT_IDENTITY_BASE_URL, env = "UPLOADER_IDENTITY_URL")]
    pub identity_url: String,

    /// Scope requested for the access token.
    #[arg(long, default_value = DEFAULT_STORAGE_SCOPE, env = "UPLOADER_SCOPE")]
    pub scope: String,

    /// Timeout in seconds for token requests.
    #[arg(long, default_value_t = DEFAULT_IDENTITY_TIMEOUT_SECS, env = "UPLOADER_IDENTITY_TIMEOUT")]
    pub identity_timeout: u64,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_account.trim().is_empty() {
            return Err(
                "Storage account is required. Set --storage-account or UPLOADER_STORAGE_ACCOUNT"
                    .to_string(),
            );
        }
        if self.container.trim().is_empty() {
            return Err(
                "Container name is required. Set --container or UPLOADER_CONTAINER".to_string(),
            );
        }
        if self.tenant_id.trim().is_empty()
            || self.client_id.trim().is_empty()
            || self.client_secret.is_empty()
        {
            return Err("Azure AD tenant id, client id and client secret are required".to_string());
        }
        if self.storage_protocol != "https" && self.storage_protocol != "http" {
            return Err("storage_protocol must be http or https".to_string());
        }
        if self.identity_timeout == 0 {
            return Err("identity_timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Connection string for the storage account.
    pub fn connection_string(&self) -> ConnectionString {
        let cs = ConnectionString::new(&self.storage_protocol, &self.storage_account);
        match &self.blob_endpoint {
            Some(endpoint) => cs.with_blob_endpoint(endpoint),
            None => cs,
        }
    }

    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials {
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_secs(self.identity_timeout)
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Cache store settings.
#[derive(Args, Debug, Clone)]
pub struct CacheConfig {
    /// Cache store backend.
    #[arg(long, value_enum, default_value_t = CacheBackend::Redis, env = "UPLOADER_CACHE_BACKEND")]
    pub cache_backend: CacheBackend,

    /// Redis host (required with the redis backend).
    #[arg(long, env = "UPLOADER_REDIS_HOST")]
    pub redis_host: Option<String>,

    /// Redis port.
    #[arg(long, default_value_t = DEFAULT_REDIS_PORT, env = "UPLOADER_REDIS_PORT")]
    pub redis_port: u16,

    /// Redis password.
    #[arg(long, env = "UPLOADER_REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Namespace prepended to every cache key.
    #[arg(long, default_value = "", env = "UPLOADER_CACHE_PREFIX")]
    pub cache_prefix: String,

    /// TTL in seconds for the cached rendered image.
    #[arg(long, default_value_t = DEFAULT_IMAGE_TTL_SECS, env = "UPLOADER_IMAGE_CACHE_TTL")]
    pub image_cache_ttl: u64,

    /// Maximum entries kept by the memory backend.
    #[arg(long, default_value_t = DEFAULT_MEMORY_STORE_ENTRIES, env = "UPLOADER_MEMORY_CACHE_ENTRIES")]
    pub memory_cache_entries: usize,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_backend == CacheBackend::Redis
            && self.redis_host.as_deref().map_or(true, |h| h.trim().is_empty())
        {
            return Err(
                "Redis host is required. Set --redis-host or UPLOADER_REDIS_HOST, \
                 or use --cache-backend memory"
                    .to_string(),
            );
        }
        if self.redis_port == 0 {
            return Err("redis_port must be greater than 0".to_string());
        }
        if self.image_cache_ttl == 0 {
            return Err("image_cache_ttl must be greater than 0".to_string());
        }
        if self.memory_cache_entries == 0 {
            return Err("memory_cache_entries must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Build the cache registry for the configured backend.
    pub fn registry(&self) -> Result<CacheRegistry, CacheError> {
        match self.cache_backend {
            CacheBackend::Redis => CacheRegistry::redis(
                self.redis_host.as_deref().unwrap_or_default(),
                self.redis_port,
                self.redis_password.as_deref(),
                &self.cache_prefix,
            ),
            CacheBackend::Memory => Ok(CacheRegistry::new(
                Arc::new(MemoryStore::with_capacity(self.memory_cache_entries)),
                &self.cache_prefix,
            )),
        }
    }

    /// Human-readable description of the cache store.
    pub fn describe(&self) -> String {
        match self.cache_backend {
            CacheBackend::Redis => format!(
                "redis://{}:{}",
                self.redis_host.as_deref().unwrap_or_default(),
                self.redis_port
            ),
            CacheBackend::Memory => format!("memory ({} entries)", self.memory_cache_entries),
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "UPLOADER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "UPLOADER_PORT")]
    pub port: u16,

    /// Directory where downloaded images are staged.
    #[arg(long, env = "UPLOADER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Allowed CORS origins (comma-separated). Any origin if not specified.
    #[arg(long, env = "UPLOADER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub cache: CacheConfig,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        self.storage.validate()?;
        self.cache.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_dir(&self) -> PathBuf {
        resolve_cache_dir(self.cache_dir.as_ref())
    }
}

// =============================================================================
// Check Command
// =============================================================================

/// Options for `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub cache: CacheConfig,

    /// Directory where downloaded images are staged.
    #[arg(long, env = "UPLOADER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Also download the stored image.
    #[arg(long, default_value_t = false)]
    pub fetch_image: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.cache.validate()
    }

    pub fn cache_dir(&self) -> PathBuf {
        resolve_cache_dir(self.cache_dir.as_ref())
    }
}

fn resolve_cache_dir(configured: Option<&PathBuf>) -> PathBuf {
    configured
        .cloned()
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME))
}

// =============================================================================
// Tests
// =============================================================================
