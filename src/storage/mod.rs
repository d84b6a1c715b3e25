//! Storage backend abstraction layer
//!
//! Provides a unified interface for storing files on different backends
//! (local disk, S3-compatible stores, vendor cloud object stores, memory).
//! Object I/O goes through the `object_store` crate; bucket administration
//! for S3-compatible stores goes through `aws-sdk-s3`.

mod client;
mod descriptor;
mod facade;
mod local;
mod memory;
mod oss;
mod s3;
mod sink;
pub mod url;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{BackendKind, StorageConfig};
use crate::errors::{Result, StorageError};

pub use descriptor::{
    content_type_for, generate_object_name, validate_object_name, ByteStream, FileDescriptor,
    UploadSource,
};
pub use facade::FileStorage;
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use oss::OssBackend;
pub use s3::S3Backend;
pub use sink::DownloadSink;

/// Storage backend trait for unified file operations
///
/// Implementations wrap one long-lived provider client and translate every
/// provider failure into a [`StorageError`] kind.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether `bucket` exists. An absent bucket is `Ok(false)`, not an error.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create `bucket`; succeeds if it already exists
    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    /// Store the whole source and describe the stored object
    async fn upload(&self, source: UploadSource<'_>) -> Result<FileDescriptor>;

    /// Delete an object. Blank names are rejected before any I/O; missing
    /// objects are not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Stream an object into `sink`
    async fn download(&self, name: &str, sink: &mut dyn DownloadSink) -> Result<()>;

    /// Public URL for an object. Pure: no I/O, never fails.
    fn get_url(&self, name: &str) -> String;
}

/// Reject bucket names that could escape a namespace before any I/O
pub(crate) fn check_bucket_arg(bucket: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        return Err(StorageError::InvalidArgument(
            "bucket name must not be blank".to_string(),
        ));
    }
    if bucket.trim() == "." || bucket.contains(['/', '\\']) || bucket.contains("..") {
        return Err(StorageError::InvalidArgument(format!(
            "invalid bucket name `{}`",
            bucket
        )));
    }
    Ok(())
}

fn missing_section(name: &str) -> StorageError {
    StorageError::config(name, "section is missing for the selected backend")
}

/// Create a storage backend based on configuration
///
/// The selected backend's settings are validated first; nothing is built
/// when they are invalid.
pub async fn create_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    config.validate()?;
    let client = &config.client;
    let limit = config.max_upload_size;

    match config.kind {
        BackendKind::Local => {
            let section = config.local.as_ref().ok_or_else(|| missing_section("storage.local"))?;
            let backend = LocalBackend::new(section, client, limit).await?;
            Ok(Arc::new(backend))
        }
        BackendKind::S3 => {
            let section = config.s3.as_ref().ok_or_else(|| missing_section("storage.s3"))?;
            let backend = S3Backend::new(section, client, limit).await?;
            Ok(Arc::new(backend))
        }
        BackendKind::Oss => {
            let section = config.oss.as_ref().ok_or_else(|| missing_section("storage.oss"))?;
            let backend = OssBackend::new(section, client, limit).await?;
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => {
            let section = config.memory.as_ref().ok_or_else(|| missing_section("storage.memory"))?;
            let backend = MemoryBackend::new(section, client, limit)?;
            Ok(Arc::new(backend))
        }
    }
}

/// `object_store` HTTP client options from the shared client settings
pub(crate) fn http_options(client: &crate::config::ClientConfig) -> object_store::ClientOptions {
    object_store::ClientOptions::new()
        .with_timeout(std::time::Duration::from_secs(client.request_timeout_secs))
        .with_connect_timeout(std::time::Duration::from_secs(client.connect_timeout_secs))
}
