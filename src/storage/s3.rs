//! S3-compatible storage backend
//!
//! Objects go through `object_store::aws::AmazonS3`; bucket administration
//! (HEAD/CREATE bucket), which `object_store` does not cover, goes through
//! `aws-sdk-s3`. Both clients are built once and reused for every call.
//!
//! Authentication uses explicit keys when configured, otherwise the default
//! AWS credential chain:
//! - Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY)
//! - IRSA / web identity tokens in Kubernetes
//! - EC2 instance metadata and ECS task roles

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use object_store::aws::AmazonS3Builder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{ClientConfig, S3Config};
use crate::errors::{Operation, Result, StorageError};
use crate::storage::client::ObjectClient;
use crate::storage::{
    check_bucket_arg, http_options, url, DownloadSink, FileDescriptor, StorageBackend, UploadSource,
};

/// Bucket administration over the S3 API
pub(crate) struct BucketAdmin {
    backend: &'static str,
    client: aws_sdk_s3::Client,
    location: Option<String>,
}

/// Connection settings for [`BucketAdmin`]
pub(crate) struct AdminSettings<'a> {
    pub region: &'a str,
    pub endpoint: Option<&'a str>,
    pub credentials: Option<(&'a str, &'a str)>,
    pub force_path_style: bool,
    /// Location constraint sent with CreateBucket
    pub location: Option<String>,
}

impl BucketAdmin {
    pub async fn new(
        backend: &'static str,
        settings: AdminSettings<'_>,
        client: &ClientConfig,
    ) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(client.request_timeout_secs))
            .connect_timeout(Duration::from_secs(client.connect_timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.to_string()))
            .timeout_config(timeouts);
        if let Some((access_key, secret_key)) = settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "filestore",
            ));
        }
        if let Some(endpoint) = settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        Self {
            backend,
            client: aws_sdk_s3::Client::from_conf(conf),
            location: settings.location,
        }
    }

    pub async fn exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);
                if not_found || status_of(&err) == Some(404) {
                    return Ok(false);
                }
                Err(classify(self.backend, Operation::BucketExists, bucket, &err))
            }
        }
    }

    pub async fn create(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(location) = &self.location {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!(backend = self.backend, bucket = %bucket, "Bucket created");
                Ok(())
            }
            Err(err) => match err.as_service_error() {
                Some(e) if e.is_bucket_already_owned_by_you() => Ok(()),
                Some(e) if e.is_bucket_already_exists() => {
                    error!(backend = self.backend, bucket = %bucket, "Bucket name is owned by another account");
                    Err(StorageError::Permission(format!(
                        "bucket `{}` belongs to another account",
                        bucket
                    )))
                }
                _ => Err(classify(self.backend, Operation::MakeBucket, bucket, &err)),
            },
        }
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

/// Map an SDK failure into the taxonomy, logging the full context
fn classify<E>(
    backend: &'static str,
    op: Operation,
    bucket: &str,
    err: &SdkError<E, HttpResponse>,
) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    error!(
        backend,
        operation = op.as_str(),
        bucket = %bucket,
        error = %DisplayErrorContext(err),
        "Bucket operation failed"
    );
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StorageError::Connectivity(format!("{} endpoint could not be reached", backend))
        }
        _ => match status_of(err) {
            Some(401) | Some(403) => StorageError::Permission(format!(
                "{} of bucket `{}` was not permitted",
                op.as_str(),
                bucket
            )),
            _ => StorageError::Unknown(format!("{} of bucket `{}` failed", op.as_str(), bucket)),
        },
    }
}

/// Object store builder plus the endpoint it is pinned to.
///
/// Credentials may come from the environment; the endpoint never does, so
/// objects always land where `get_url` points.
fn object_store_builder(config: &S3Config, client: &ClientConfig) -> (AmazonS3Builder, String) {
    let endpoint = config
        .endpoint
        .clone()
        .unwrap_or_else(|| url::aws_endpoint(&config.region));

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_endpoint(&endpoint)
        .with_virtual_hosted_style_request(false)
        .with_allow_http(config.allow_http)
        .with_client_options(http_options(client).with_allow_http(config.allow_http));
    if let Some((access_key, secret_key)) = config.access_key.as_deref().zip(config.secret_key.as_deref()) {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key);
    }
    (builder, endpoint)
}

/// S3-compatible storage backend
pub struct S3Backend {
    client: ObjectClient,
    buckets: BucketAdmin,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Backend {
    pub async fn new(config: &S3Config, client: &ClientConfig, max_upload_size: usize) -> Result<Self> {
        config.validate()?;
        client.validate()?;

        let credentials = config
            .access_key
            .as_deref()
            .zip(config.secret_key.as_deref());
        let (builder, endpoint) = object_store_builder(config, client);

        let store = builder.build().map_err(|e| {
            StorageError::config("storage.s3", format!("cannot build S3 client: {}", e))
        })?;

        // AWS rejects an explicit us-east-1 constraint; custom endpoints get none
        let location = match (&config.endpoint, config.region.as_str()) {
            (None, region) if region != "us-east-1" => Some(region.to_string()),
            _ => None,
        };
        let buckets = BucketAdmin::new(
            "s3",
            AdminSettings {
                region: &config.region,
                endpoint: Some(endpoint.as_str()),
                credentials,
                force_path_style: config.endpoint.is_some(),
                location,
            },
            client,
        )
        .await;

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 storage ready"
        );

        Ok(Self {
            client: ObjectClient::new(
                "s3",
                Arc::new(store),
                client.max_concurrent_requests,
                max_upload_size,
            ),
            buckets,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    /// Number of object calls made so far
    pub fn request_count(&self) -> u64 {
        self.client.request_count()
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
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
        match &self.endpoint {
            Some(endpoint) => url::path_style(endpoint, &self.bucket, name),
            None => url::aws(&self.bucket, &self.region, name),
        }
    }
}
