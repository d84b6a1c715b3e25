//! HTTP routes for the file store
//!
//! - POST /files?name=... - upload (multipart field `file`)
//! - GET /files/{name} - download
//! - DELETE /files/{name} - delete
//! - GET /url/{name} - public URL of an object
//! - GET /buckets/{bucket} - bucket existence
//! - PUT /buckets/{bucket} - create bucket

mod handlers;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::metrics::HTTP_REQUESTS;
use crate::storage::FileStorage;

pub use handlers::ResponseSink;

/// Query parameters for uploads
#[derive(Debug, Default, serde::Deserialize)]
pub struct UploadQuery {
    /// Explicit object name; generated when absent
    pub name: Option<String>,
}

/// Create the file store router.
///
/// `body_limit` caps request bodies; multipart framing adds a little on top
/// of the storage upload limit.
pub fn create_router(storage: Arc<FileStorage>, body_limit: usize) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .route("/files", post(handlers::upload_file))
        .route(
            "/files/*name",
            get(handlers::download_file).delete(handlers::delete_file),
        )
        .route("/url/*name", get(handlers::file_url))
        .route(
            "/buckets/:bucket",
            get(handlers::bucket_exists).put(handlers::make_bucket),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn(count_requests))
        .with_state(storage)
}

async fn count_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}
