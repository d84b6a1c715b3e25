//! Storage facade
//!
//! The single entry point the rest of the application uses. It owns the one
//! backend selected at startup and forwards every call to it unchanged: no
//! retries, no extra locking, no re-validation of configuration.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::{BackendKind, StorageConfig};
use crate::errors::{Operation, Result, StorageError};
use crate::metrics;
use crate::storage::{create_backend, DownloadSink, FileDescriptor, StorageBackend, UploadSource};

pub struct FileStorage {
    kind: BackendKind,
    bucket: String,
    backend: Arc<dyn StorageBackend>,
}

impl FileStorage {
    /// Validate `config` and build the selected backend.
    ///
    /// This is the only place configuration errors surface.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let backend = create_backend(config).await?;
        let bucket = config
            .bucket()
            .ok_or_else(|| StorageError::config("storage", "no bucket configured"))?
            .to_string();

        info!(backend = %config.kind, bucket = %bucket, "Storage backend initialized");
        Ok(Self::with_backend(config.kind, bucket, backend))
    }

    /// Wrap an already constructed backend
    pub fn with_backend(
        kind: BackendKind,
        bucket: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            kind,
            bucket: bucket.into(),
            backend,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Bucket uploads land in
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the configured bucket unless it already exists
    pub async fn ensure_bucket(&self) -> Result<()> {
        if !self.bucket_exists(&self.bucket).await? {
            self.make_bucket(&self.bucket).await?;
            info!(backend = %self.kind, bucket = %self.bucket, "Created missing bucket");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let start = Instant::now();
        let result = self.backend.bucket_exists(bucket).await;
        metrics::observe(Operation::BucketExists, &result, start);
        result
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        let start = Instant::now();
        let result = self.backend.make_bucket(bucket).await;
        metrics::observe(Operation::MakeBucket, &result, start);
        result
    }

    async fn upload(&self, source: UploadSource<'_>) -> Result<FileDescriptor> {
        let start = Instant::now();
        let result = self.backend.upload(source).await;
        if let Ok(file) = &result {
            metrics::UPLOADED_BYTES.inc_by(file.size());
        }
        metrics::observe(Operation::Upload, &result, start);
        result
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        let result = self.backend.delete(name).await;
        metrics::observe(Operation::Delete, &result, start);
        result
    }

    async fn download(&self, name: &str, sink: &mut dyn DownloadSink) -> Result<()> {
        let start = Instant::now();
        let result = self.backend.download(name, sink).await;
        metrics::observe(Operation::Download, &result, start);
        result
    }

    fn get_url(&self, name: &str) -> String {
        let start = Instant::now();
        let url = self.backend.get_url(name);
        metrics::observe(Operation::GetUrl, &Ok(()), start);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    fn memory_config() -> StorageConfig {
        StorageConfig {
            kind: BackendKind::Memory,
            local: None,
            memory: Some(MemoryConfig {
                endpoint: "oss-cn.example.com".to_string(),
                bucket: "mybucket".to_string(),
            }),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn facade_delegates_to_selected_backend() {
        let storage = FileStorage::new(&memory_config()).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Memory);
        assert_eq!(storage.bucket(), "mybucket");

        let file = storage
            .upload(UploadSource::from_bytes("hello").with_object_name("a.txt"))
            .await
            .unwrap();
        assert_eq!(file.url(), "https://mybucket.oss-cn.example.com/a.txt");
        assert_eq!(storage.get_url("a.txt"), file.url());

        let mut sink = Vec::new();
        storage.download("a.txt", &mut sink).await.unwrap();
        assert_eq!(sink, b"hello");

        storage.delete("a.txt").await.unwrap();
        storage.delete("a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_configuration_prevents_construction() {
        let mut config = memory_config();
        config.memory = Some(MemoryConfig {
            endpoint: "oss-cn.example.com".to_string(),
            bucket: "Not_A_Bucket".to_string(),
        });
        let err = FileStorage::new(&config).await.err().unwrap();
        match err {
            StorageError::Configuration { setting, hint } => {
                assert_eq!(setting, "storage.memory.bucket");
                assert!(hint.contains("Not_A_Bucket"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ensure_bucket_creates_missing_bucket() {
        let config = memory_config();
        let backend = crate::storage::MemoryBackend::new(
            config.memory.as_ref().unwrap(),
            &config.client,
            config.max_upload_size,
        )
        .unwrap();
        let storage = FileStorage::with_backend(BackendKind::Memory, "fresh", Arc::new(backend));

        assert!(!storage.bucket_exists("fresh").await.unwrap());
        storage.ensure_bucket().await.unwrap();
        storage.ensure_bucket().await.unwrap();
        assert!(storage.bucket_exists("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn failures_pass_through_unchanged() {
        let storage = FileStorage::new(&memory_config()).await.unwrap();
        let mut sink = Vec::new();
        let err = storage.download("missing.txt", &mut sink).await.unwrap_err();
        assert_eq!(err, StorageError::NotFound("missing.txt".to_string()));

        let err = storage.delete("").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }
}
