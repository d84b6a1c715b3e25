//! Shared object I/O over a long-lived `object_store` handle
//!
//! Each backend builds its store once and wraps it here. Every I/O call takes
//! a permit from the client's semaphore for exactly the duration of the
//! provider call; the permit is an RAII guard, so it is returned on success,
//! on error, and when the caller drops the future.

use futures::StreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderValue;
use object_store::{ObjectStore, PutPayload};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, warn};

use crate::errors::{Operation, Result, StorageError};
use crate::storage::descriptor::{
    collect_limited, content_type_for, validate_object_name, FileDescriptor, UploadSource,
};
use crate::storage::sink::DownloadSink;

pub(crate) struct ObjectClient {
    backend: &'static str,
    store: Arc<dyn ObjectStore>,
    permits: Semaphore,
    requests: AtomicU64,
    max_upload_size: usize,
}

impl ObjectClient {
    pub fn new(
        backend: &'static str,
        store: Arc<dyn ObjectStore>,
        max_concurrent_requests: usize,
        max_upload_size: usize,
    ) -> Self {
        Self {
            backend,
            store,
            permits: Semaphore::new(max_concurrent_requests),
            requests: AtomicU64::new(0),
            max_upload_size,
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self.permits.acquire().await.map_err(|_| {
            StorageError::Connectivity(format!("{} client is shut down", self.backend))
        })?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(permit)
    }

    /// Number of provider calls issued so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Buffer the whole source, then write it with a single `put`.
    ///
    /// A source that fails or overflows the size limit never reaches the
    /// store, and a single `put` is atomic on every supported provider.
    pub async fn upload<F>(&self, source: UploadSource<'_>, url: F) -> Result<FileDescriptor>
    where
        F: Fn(&str) -> String,
    {
        let prepared = source.prepare()?;
        let path = validate_object_name(&prepared.name)?;
        let data = collect_limited(prepared.stream, self.max_upload_size).await?;
        let size = data.len() as u64;
        let start = Instant::now();

        {
            let _permit = self.acquire().await?;
            self.store
                .put(&path, PutPayload::from(data))
                .await
                .map_err(|e| {
                    StorageError::from_object_store(self.backend, Operation::Upload, &prepared.name, e)
                })?;
        }

        info!(
            backend = self.backend,
            object = %prepared.name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload successful"
        );

        let url = url(&prepared.name);
        Ok(FileDescriptor::new(
            prepared.name,
            prepared.original_name,
            size,
            prepared.content_type,
            url,
        ))
    }

    pub async fn download(&self, name: &str, sink: &mut dyn DownloadSink) -> Result<()> {
        let path = validate_object_name(name)?;
        let start = Instant::now();
        let _permit = self.acquire().await?;

        let result = self.store.get(&path).await.map_err(|e| {
            StorageError::from_object_store(self.backend, Operation::Download, name, e)
        })?;

        if let Ok(content_type) = HeaderValue::from_str(&content_type_for(name)) {
            sink.set_header(CONTENT_TYPE, content_type);
        }
        sink.set_header(CONTENT_LENGTH, HeaderValue::from(result.meta.size));

        let mut size = 0u64;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::from_object_store(self.backend, Operation::Download, name, e)
            })?;
            size += chunk.len() as u64;
            sink.write(chunk).await.map_err(|e| {
                warn!(backend = self.backend, object = %name, error = %e, "Download sink rejected data");
                StorageError::Download(format!("download of `{}` was interrupted", name))
            })?;
        }

        info!(
            backend = self.backend,
            object = %name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Download successful"
        );
        Ok(())
    }

    /// Delete `name`; a missing object counts as deleted
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = validate_object_name(name)?;
        let start = Instant::now();
        let _permit = self.acquire().await?;

        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                info!(
                    backend = self.backend,
                    object = %name,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Delete successful"
                );
                Ok(())
            }
            Err(e) => Err(StorageError::from_object_store(
                self.backend,
                Operation::Delete,
                name,
                e,
            )),
        }
    }
}
