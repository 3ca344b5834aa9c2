//! Image operations against blob storage.
//!
//! A manager lives for one request. It connects lazily through the shared
//! [`BlobStorageAuthenticator`] and keeps that connection for its lifetime;
//! the next request builds a new manager and so observes any token rotation.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::connection::Connection;
use crate::auth::BlobStorageAuthenticator;
use crate::error::{AuthError, BlobError, StorageError};

/// Suffix appended to the image id to form the blob name.
pub const BLOB_NAME_SUFFIX: &str = "general-images";

/// Sub-directory of the cache dir where downloads are staged.
pub const STAGING_DIR_NAME: &str = "img_azure";

/// Upload payloads are decoded with or without padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Gets and uploads images in one container.
pub struct BlobStorageManager {
    authenticator: Arc<BlobStorageAuthenticator>,
    container: String,
    staging_dir: PathBuf,
    connection: OnceCell<Connection>,
}

impl BlobStorageManager {
    /// Create a manager for `container`, staging downloads under
    /// `<cache_dir>/img_azure`.
    pub fn new(
        authenticator: Arc<BlobStorageAuthenticator>,
        container: impl Into<String>,
        cache_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            authenticator,
            container: container.into(),
            staging_dir: cache_dir.as_ref().join(STAGING_DIR_NAME),
            connection: OnceCell::new(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Blob name for an image id.
    pub fn blob_name(img_id: &str) -> String {
        format!("{}-{}", img_id, BLOB_NAME_SUFFIX)
    }

    /// Connection for this manager, established on first use.
    pub async fn connect(&self) -> Result<&Connection, AuthError> {
        self.connection
            .get_or_try_init(|| self.authenticator.get_connection())
            .await
    }

    /// Base64 content of the single blob whose name starts with `img_id`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::ContainerNotFound`] if the container does not exist
    /// - [`StorageError::ImageNotFound`] if no blob matches
    /// - [`StorageError::AmbiguousImage`] if several blobs match
    /// - [`StorageError::Download`] if the blob cannot be fetched or staged
    pub async fn get_image(&self, img_id: &str) -> Result<String, StorageError> {
        let connection = self.connect().await?;
        let backend = connection.backend();

        if !self.container_exists(connection).await? {
            return Err(StorageError::ContainerNotFound {
                container: self.container.clone(),
            });
        }

        let mut blobs = backend.list_blobs(&self.container, img_id).await?;
        let blob_name = match blobs.len() {
            0 => {
                return Err(StorageError::ImageNotFound {
                    img_id: img_id.to_string(),
                })
            }
            1 => blobs.remove(0),
            count => {
                error!(img_id, count, container = %self.container, "Several blobs match one image id");
                return Err(StorageError::AmbiguousImage {
                    img_id: img_id.to_string(),
                    count,
                });
            }
        };

        self.download(connection, &blob_name)
            .await
            .map_err(|source| StorageError::Download {
                img_id: img_id.to_string(),
                source,
            })
    }

    /// Whether the configured container exists.
    pub async fn has_container(&self) -> Result<bool, StorageError> {
        let connection = self.connect().await?;
        Ok(self.container_exists(connection).await?)
    }

    /// Like [`get_image`](Self::get_image), with "nothing uploaded yet"
    /// returned as `None`.
    pub async fn find_image(&self, img_id: &str) -> Result<Option<String>, StorageError> {
        match self.get_image(img_id).await {
            Ok(base64) => Ok(Some(base64)),
            Err(e) if e.is_not_found() => {
                debug!(img_id, reason = %e, "No image stored");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode `image_base64` and store it as `<img_id>-general-images`,
    /// creating the container first if needed. An existing blob is replaced.
    pub async fn upload_image(&self, img_id: &str, image_base64: &str) -> Result<(), StorageError> {
        self.try_upload(img_id, image_base64)
            .await
            .map_err(|source| StorageError::Upload {
                img_id: img_id.to_string(),
                source,
            })
    }

    async fn try_upload(&self, img_id: &str, image_base64: &str) -> Result<(), BoxError> {
        let connection = self.connect().await?;
        self.ensure_container(connection).await?;

        let data = LENIENT_BASE64.decode(image_base64.trim())?;
        let blob_name = Self::blob_name(img_id);
        let size = data.len();

        connection
            .backend()
            .put_block_blob(&self.container, &blob_name, Bytes::from(data))
            .await?;

        info!(img_id, blob = %blob_name, size, "Image uploaded");
        Ok(())
    }

    // =========================================================================
    // Container lifecycle
    // =========================================================================

    async fn container_exists(&self, connection: &Connection) -> Result<bool, BlobError> {
        let containers = connection.backend().list_containers().await?;
        Ok(containers.iter().any(|name| *name == self.container))
    }

    /// Check then create. A concurrent creator may win between the two
    /// steps; the backend reports that as success.
    async fn ensure_container(&self, connection: &Connection) -> Result<(), BlobError> {
        if self.container_exists(connection).await? {
            return Ok(());
        }

        connection.backend().create_container(&self.container).await?;
        info!(container = %self.container, "Container created");
        Ok(())
    }

    // =========================================================================
    // Staging
    // =========================================================================

    async fn download(&self, connection: &Connection, blob_name: &str) -> Result<String, BlobError> {
        let data = connection
            .backend()
            .get_blob(&self.container, blob_name)
            .await?;

        self.ensure_staging_dir().await?;
        let path = self.staging_dir.join(staging_file_name(blob_name));
        let size = data.len();

        let staged = {
            let staging_dir = self.staging_dir.clone();
            let path = path.clone();
            tokio::task::spawn_blocking(move || stage(&staging_dir, &path, &data))
                .await
                .map_err(io::Error::other)??
        };
        debug!(path = %path.display(), size, "Blob staged");

        Ok(STANDARD.encode(staged))
    }

    async fn ensure_staging_dir(&self) -> std::io::Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o770);
        builder.create(&self.staging_dir).await
    }
}

/// Write `data` to a private temp file in `staging_dir`, read it back from
/// that file and move it onto `path`.
///
/// Concurrent downloads of the same blob each read their own file; the
/// rename onto `path` is atomic, so the staged copy is always complete.
fn stage(staging_dir: &Path, path: &Path, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut file = NamedTempFile::new_in(staging_dir)?;
    file.write_all(data)?;
    file.flush()?;

    file.seek(SeekFrom::Start(0))?;
    let mut staged = Vec::with_capacity(data.len());
    file.read_to_end(&mut staged)?;

    file.persist(path).map_err(|e| e.error)?;
    Ok(staged)
}

/// Blob names may contain path separators; the staged file stays flat.
fn staging_file_name(blob_name: &str) -> String {
    blob_name.replace(['/', '\\'], "_")
}
