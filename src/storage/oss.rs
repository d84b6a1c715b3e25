//! Vendor cloud object store backend (Aliyun OSS and similar)
//!
//! The store is addressed virtual-hosted style, `https://{bucket}.{endpoint}`,
//! through its S3-compatible API. Public URLs keep the historical
//! `https://{bucket}.{endpoint}/{name}` shape.

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use std::sync::Arc;
use tracing::info;

use crate::config::{ClientConfig, OssConfig};
use crate::errors::{Result, StorageError};
use crate::storage::client::ObjectClient;
use crate::storage::s3::{AdminSettings, BucketAdmin};
use crate::storage::{
    check_bucket_arg, http_options, url, DownloadSink, FileDescriptor, StorageBackend, UploadSource,
};

pub struct OssBackend {
    client: ObjectClient,
    buckets: BucketAdmin,
    endpoint: String,
    bucket: String,
}

impl OssBackend {
    pub async fn new(config: &OssConfig, client: &ClientConfig, max_upload_size: usize) -> Result<Self> {
        config.validate()?;
        client.validate()?;

        let region = config.signing_region();
        let bucket_host = format!(
            "https://{}{}{}",
            config.bucket,
            url::SUFFIX_SPLIT,
            config.endpoint
        );

        let store = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&region)
            .with_endpoint(bucket_host)
            .with_virtual_hosted_style_request(true)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_client_options(http_options(client))
            .build()
            .map_err(|e| {
                StorageError::config(
                    "storage.oss",
                    format!("cannot build client for {}: {}", config.endpoint, e),
                )
            })?;

        let service_url = format!("https://{}", config.endpoint);
        let buckets = BucketAdmin::new(
            "oss",
            AdminSettings {
                region: &region,
                endpoint: Some(service_url.as_str()),
                credentials: Some((config.access_key.as_str(), config.secret_key.as_str())),
                force_path_style: false,
                location: None,
            },
            client,
        )
        .await;

        info!(endpoint = %config.endpoint, bucket = %config.bucket, region = %region, "OSS storage ready");

        Ok(Self {
            client: ObjectClient::new(
                "oss",
                Arc::new(store),
                client.max_concurrent_requests,
                max_upload_size,
            ),
            buckets,
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
        })
    }

    /// Number of object calls made so far
    pub fn request_count(&self) -> u64 {
        self.client.request_count()
    }
}

#[async_trait]
impl StorageBackend for OssBackend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_bucket_arg(bucket)?;
        self.buckets.exists(bucket).await
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_arg(bucket)?;
        self.buckets.create(bucket).await
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
