//! Prometheus metrics for the file store
//!
//! Defines metrics for:
//! - HTTP request counts by method and status
//! - Storage operation counts by outcome
//! - Storage operation duration
//! - Uploaded bytes

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::errors::{Operation, Result as StorageResult};

lazy_static! {
    /// Registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// HTTP request counter by method and status
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("filestore_http_requests_total", "Total HTTP requests"),
        &["method", "status"]
    )
    .expect("Failed to create HTTP_REQUESTS metric");

    /// Storage operation counter by operation and outcome
    pub static ref STORAGE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("filestore_storage_operations_total", "Total storage operations"),
        &["operation", "outcome"]
    )
    .expect("Failed to create STORAGE_OPERATIONS metric");

    /// Storage operation duration histogram
    pub static ref STORAGE_OPERATION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "filestore_storage_operation_duration_seconds",
            "Storage operation duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"]
    )
    .expect("Failed to create STORAGE_OPERATION_DURATION metric");

    /// Bytes accepted by successful uploads
    pub static ref UPLOADED_BYTES: IntCounter = IntCounter::new(
        "filestore_uploaded_bytes_total",
        "Total bytes stored by uploads"
    )
    .expect("Failed to create UPLOADED_BYTES metric");
}

/// Register every metric with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(HTTP_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(STORAGE_OPERATIONS.clone()))?;
    REGISTRY.register(Box::new(STORAGE_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(UPLOADED_BYTES.clone()))?;
    Ok(())
}

/// Record the outcome and latency of one storage call
pub fn observe<T>(operation: Operation, result: &StorageResult<T>, start: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    STORAGE_OPERATIONS
        .with_label_values(&[operation.as_str(), outcome])
        .inc();
    STORAGE_OPERATION_DURATION
        .with_label_values(&[operation.as_str()])
        .observe(start.elapsed().as_secs_f64());
}

/// Render the registry in the Prometheus text format
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
