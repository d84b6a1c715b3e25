//! Local disk storage backend
//!
//! Each bucket is a directory under `root_path`; objects of the configured
//! bucket are written through `object_store`'s `LocalFileSystem`, which
//! stages every write in a temporary file and renames it into place.

use async_trait::async_trait;
use object_store::local::LocalFileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{ClientConfig, LocalConfig};
use crate::errors::{Operation, Result, StorageError};
use crate::storage::client::ObjectClient;
use crate::storage::{check_bucket_arg, url, DownloadSink, FileDescriptor, StorageBackend, UploadSource};

/// Local filesystem storage backend
pub struct LocalBackend {
    client: ObjectClient,
    root: PathBuf,
    base_url: String,
}

impl LocalBackend {
    /// Create the bucket directory if needed and open it
    pub async fn new(
        config: &LocalConfig,
        client: &ClientConfig,
        max_upload_size: usize,
    ) -> Result<Self> {
        config.validate()?;
        client.validate()?;

        let root = PathBuf::from(&config.root_path);
        let bucket_dir = root.join(&config.bucket);
        tokio::fs::create_dir_all(&bucket_dir).await.map_err(|e| {
            StorageError::config(
                "storage.local.root_path",
                format!("cannot create {}: {}", bucket_dir.display(), e),
            )
        })?;

        let store = LocalFileSystem::new_with_prefix(&bucket_dir).map_err(|e| {
            StorageError::config(
                "storage.local.root_path",
                format!("cannot open {}: {}", bucket_dir.display(), e),
            )
        })?;

        info!(path = %bucket_dir.display(), "Local storage ready");

        Ok(Self {
            client: ObjectClient::new(
                "local",
                Arc::new(store),
                client.max_concurrent_requests,
                max_upload_size,
            ),
            root,
            base_url: config.base_url.clone(),
        })
    }

    /// Number of filesystem object calls made so far
    pub fn request_count(&self) -> u64 {
        self.client.request_count()
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_bucket_arg(bucket)?;
        match tokio::fs::metadata(self.root.join(bucket)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io("local", Operation::BucketExists, bucket, e)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_arg(bucket)?;
        tokio::fs::create_dir_all(self.root.join(bucket))
            .await
            .map_err(|e| StorageError::from_io("local", Operation::MakeBucket, bucket, e))
    }

    async fn upload(&self, source: UploadSource<'_>) -> Result<FileDescriptor> {
        self.client.upload(source, |name| self.get_url(name)).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.client.delete(name).await
    }

    async fn download(&self, name: &str, sink: &mut dyn DownloadSink) -> Result<()> {
        self.client.download(name, sink).await
    }

    fn get_url(&self, name: &str) -> String {
        url::under_base(&self.base_url, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn backend(root: &std::path::Path) -> LocalBackend {
        let config = LocalConfig {
            root_path: root.to_string_lossy().into_owned(),
            base_url: "http://localhost:8080/files".to_string(),
            bucket: "media".to_string(),
        };
        LocalBackend::new(&config, &ClientConfig::default(), 1024 * 1024)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_upload_download() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        let file = storage
            .upload(UploadSource::from_bytes("test data").with_filename("test.txt"))
            .await
            .unwrap();
        assert!(file.name().ends_with(".txt"));
        assert_eq!(file.url(), format!("http://localhost:8080/files/{}", file.name()));
        assert!(dir.path().join("media").join(file.name()).is_file());

        let mut sink = Vec::new();
        storage.download(file.name(), &mut sink).await.unwrap();
        assert_eq!(sink, b"test data");
    }

    #[tokio::test]
    async fn test_nested_names() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        storage
            .upload(UploadSource::from_bytes("x").with_object_name("2024/05/a.txt"))
            .await
            .unwrap();
        assert!(dir.path().join("media/2024/05/a.txt").is_file());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        let mut sink = Vec::new();
        let result = storage.download("../../../etc/passwd", &mut sink).await;
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));

        let result = storage.bucket_exists("../elsewhere").await;
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));

        let result = storage.bucket_exists(".").await;
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
        let result = storage.make_bucket(".").await;
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
        assert_eq!(storage.request_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        storage.delete("nonexistent/file.txt").await.unwrap();
        storage.delete("nonexistent/file.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        let file = storage
            .upload(UploadSource::from_bytes("bye").with_object_name("bye.txt"))
            .await
            .unwrap();
        storage.delete(file.name()).await.unwrap();
        assert!(!dir.path().join("media/bye.txt").exists());

        let mut sink = Vec::new();
        let err = storage.download("bye.txt", &mut sink).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_buckets_are_directories() {
        let dir = tempdir().unwrap();
        let storage = backend(dir.path()).await;

        assert!(storage.bucket_exists("media").await.unwrap());
        assert!(!storage.bucket_exists("nope").await.unwrap());

        storage.make_bucket("archive").await.unwrap();
        storage.make_bucket("archive").await.unwrap();
        assert!(dir.path().join("archive").is_dir());
        assert!(storage.bucket_exists("archive").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_base_url_fails_fast() {
        let dir = tempdir().unwrap();
        let config = LocalConfig {
            root_path: dir.path().to_string_lossy().into_owned(),
            base_url: "not a url".to_string(),
            bucket: "media".to_string(),
        };
        let err = LocalBackend::new(&config, &ClientConfig::default(), 1024)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Configuration { .. }));
        assert!(!dir.path().join("media").exists());
    }
}
