//! Blob Image Uploader - upload an image to Azure Blob Storage and render it back.
//!
//! This binary starts the HTTP server or runs the configuration check.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blob_image_uploader::{
    auth::{AzureAdProvider, BlobStorageAuthenticator},
    cache::UploadCache,
    config::{CacheBackend, CacheConfig, CheckConfig, Cli, Command, ServeConfig, StorageConfig},
    server::{create_router, RouterConfig},
    service::{ImageService, IMAGE_ID},
    storage::AzureConnector,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// Build the image service from the storage and cache settings.
fn build_service(
    storage: &StorageConfig,
    cache: &CacheConfig,
    cache_dir: std::path::PathBuf,
) -> Result<ImageService, String> {
    let registry = cache
        .registry()
        .map_err(|e| format!("cache store: {}", e))?;
    let upload_cache = UploadCache::new(registry, cache.image_cache_ttl);

    let provider = AzureAdProvider::new(
        &storage.identity_url,
        storage.credentials(),
        storage.identity_timeout(),
    )
    .map_err(|e| format!("identity provider: {}", e))?;

    let authenticator = BlobStorageAuthenticator::new(
        &storage.connection_string(),
        upload_cache.clone(),
        Arc::new(provider),
        Arc::new(AzureConnector::default()),
    );

    Ok(ImageService::new(
        Arc::new(authenticator),
        upload_cache,
        storage.container.clone(),
        cache_dir,
    ))
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let cache_dir = config.cache_dir();

    info!("Blob Image Uploader v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Storage account: {}", config.storage.storage_account);
    if let Some(ref endpoint) = config.storage.blob_endpoint {
        info!("  Blob endpoint: {}", endpoint);
    }
    info!("  Container: {}", config.storage.container);
    info!("  Cache: {}", config.cache.describe());
    info!("  Staging dir: {}", cache_dir.display());
    if config.cache.cache_backend == CacheBackend::Memory {
        warn!("  Tokens are cached in-process and lost on restart");
    }

    let service = match build_service(&config.storage, &config.cache, cache_dir) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to initialize: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(service, build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/render", addr);
    info!(
        "    curl -X POST -H 'Content-Type: application/json' -d '{{\"imageBase64\":\"aGVsbG8=\"}}' http://{}/upload",
        addr
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "blob_image_uploader=debug,tower_http=debug"
    } else {
        "blob_image_uploader=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Blob Image Uploader Configuration Check");
    println!("═══════════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }
    println!("✓ Storage account: {}", config.storage.storage_account);
    println!("✓ Blob endpoint: {}", config.storage.connection_string().blob_endpoint());
    println!("✓ Container: {}", config.storage.container);
    println!("✓ Cache: {}", config.cache.describe());
    println!();

    let service = match build_service(&config.storage, &config.cache, config.cache_dir()) {
        Ok(service) => service,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let manager = service.manager();

    print!("Authenticating and connecting... ");
    if let Err(e) = manager.connect().await {
        println!("✗ failed");
        println!();
        println!("Error: {}", e);
        println!();
        println!("Please check:");
        println!("  - The tenant id, client id and client secret are correct");
        println!("  - The app has a role on the storage account");
        if config.cache.cache_backend == CacheBackend::Redis {
            println!("  - The Redis server is reachable");
        }
        return ExitCode::FAILURE;
    }
    println!("✓ success");

    print!("Looking up container '{}'... ", config.storage.container);
    match manager.has_container().await {
        Ok(true) => println!("✓ found"),
        Ok(false) => println!("- not created yet (created on first upload)"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if config.fetch_image {
        print!("Fetching image '{}'... ", IMAGE_ID);
        match manager.find_image(IMAGE_ID).await {
            Ok(Some(base64)) => println!("✓ found ({} base64 chars)", base64.len()),
            Ok(None) => println!("- nothing uploaded yet"),
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("═══════════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
