//! In-memory storage backend
//!
//! Behaves like a vendor cloud object store (same URL shape, same error
//! mapping) without any network. Objects live in an `object_store`
//! `InMemory` store for the configured bucket; other buckets exist only as
//! names.

use async_trait::async_trait;
use object_store::memory::InMemory;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{ClientConfig, MemoryConfig};
use crate::errors::Result;
use crate::storage::client::ObjectClient;
use crate::storage::{check_bucket_arg, url, DownloadSink, FileDescriptor, StorageBackend, UploadSource};

pub struct MemoryBackend {
    client: ObjectClient,
    endpoint: String,
    bucket: String,
    buckets: RwLock<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new(config: &MemoryConfig, client: &ClientConfig, max_upload_size: usize) -> Result<Self> {
        config.validate()?;
        client.validate()?;

        let store = Arc::new(InMemory::new());
        Ok(Self {
            client: ObjectClient::new(
                "memory",
                store,
                client.max_concurrent_requests,
                max_upload_size,
            ),
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            buckets: RwLock::new(HashSet::from([config.bucket.clone()])),
        })
    }

    /// Number of store calls made so far
    pub fn request_count(&self) -> u64 {
        self.client.request_count()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_bucket_arg(bucket)?;
        Ok(self.buckets.read().await.contains(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_arg(bucket)?;
        if self.buckets.write().await.insert(bucket.to_string()) {
            info!(backend = "memory", bucket = %bucket, "Bucket created");
        }
        Ok(())
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
        url::virtual_hosted(&self.bucket, &self.endpoint, name)
    }
}
