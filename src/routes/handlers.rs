//! Request handlers for the file store API

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::{Result, StorageError};
use crate::metrics;
use crate::routes::UploadQuery;
use crate::storage::{DownloadSink, FileStorage, StorageBackend, UploadSource};

/// Multipart field carrying the file body
const FILE_FIELD: &str = "file";

/// Health check endpoint
#[instrument]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: the default bucket must be reachable
#[instrument(skip(storage))]
pub async fn ready(State(storage): State<Arc<FileStorage>>) -> impl IntoResponse {
    match storage.bucket_exists(storage.bucket()).await {
        Ok(true) => (StatusCode::OK, "Ready".to_string()),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("bucket {} does not exist", storage.bucket()),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.code().to_string())
        }
    }
}

/// Prometheus metrics endpoint
#[instrument]
pub async fn metrics() -> Response {
    match metrics::gather() {
        Ok(body) => body.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Upload - POST /files
#[instrument(skip(storage, multipart))]
pub async fn upload_file(
    State(storage): State<Arc<FileStorage>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StorageError::InvalidArgument(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let stream = field
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)))
            .boxed();

        let mut source = UploadSource::new(stream);
        if let Some(filename) = filename {
            source = source.with_filename(filename);
        }
        if let Some(content_type) = content_type {
            source = source.with_content_type(content_type);
        }
        if let Some(name) = query.name.clone() {
            source = source.with_object_name(name);
        }

        let file = storage.upload(source).await?;
        info!(object = %file.name(), size = file.size(), "File uploaded");
        return Ok((StatusCode::CREATED, Json(file)).into_response());
    }

    Err(StorageError::InvalidArgument(format!(
        "multipart field `{}` is missing",
        FILE_FIELD
    )))
}

/// Download - GET /files/{name}
#[instrument(skip(storage))]
pub async fn download_file(
    State(storage): State<Arc<FileStorage>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let mut sink = ResponseSink::default();
    storage.download(&name, &mut sink).await?;

    let filename = name.rsplit('/').next().unwrap_or(&name).replace('"', "_");
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", filename)) {
        sink.headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(sink.into_response())
}

/// Delete - DELETE /files/{name}
#[instrument(skip(storage))]
pub async fn delete_file(
    State(storage): State<Arc<FileStorage>>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    storage.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public URL - GET /url/{name}
#[instrument(skip(storage))]
pub async fn file_url(
    State(storage): State<Arc<FileStorage>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let url = storage.get_url(&name);
    Json(json!({ "name": name, "url": url }))
}

/// Bucket existence - GET /buckets/{bucket}
#[instrument(skip(storage))]
pub async fn bucket_exists(
    State(storage): State<Arc<FileStorage>>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse> {
    let exists = storage.bucket_exists(&bucket).await?;
    Ok(Json(json!({ "bucket": bucket, "exists": exists })))
}

/// Create bucket - PUT /buckets/{bucket}
#[instrument(skip(storage))]
pub async fn make_bucket(
    State(storage): State<Arc<FileStorage>>,
    Path(bucket): Path<String>,
) -> Result<StatusCode> {
    storage.make_bucket(&bucket).await?;
    Ok(StatusCode::OK)
}

/// Collects a download into an HTTP response.
///
/// The whole object is buffered before the response is sent, so a download
/// holds up to `storage.max_upload_size` bytes in memory.
#[derive(Debug, Default)]
pub struct ResponseSink {
    headers: HeaderMap,
    body: BytesMut,
}

#[async_trait]
impl DownloadSink for ResponseSink {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }
}

impl IntoResponse for ResponseSink {
    fn into_response(self) -> Response {
        (self.headers, self.body.freeze()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{BackendKind, MemoryConfig, StorageConfig};
    use crate::routes::create_router;
    use crate::storage::FileStorage;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "filestore-boundary";

    async fn app() -> Router {
        let config = StorageConfig {
            kind: BackendKind::Memory,
            local: None,
            memory: Some(MemoryConfig {
                endpoint: "oss-cn.example.com".to_string(),
                bucket: "mybucket".to_string(),
            }),
            max_upload_size: 1024,
            ..StorageConfig::default()
        };
        let storage = FileStorage::new(&config).await.unwrap();
        create_router(Arc::new(storage), 4096)
    }

    fn multipart_request(uri: &str, field: &str, filename: &str, body: &str) -> Request<Body> {
        let payload = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n{body}\r\n--{b}--\r\n",
            b = BOUNDARY,
            field = field,
            filename = filename,
            body = body,
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(payload))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn upload_download_delete_cycle() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(multipart_request("/files?name=docs/a.txt", "file", "a.txt", "hello world"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let file = json_body(response).await;
        assert_eq!(file["name"], "docs/a.txt");
        assert_eq!(file["original_name"], "a.txt");
        assert_eq!(file["size"], 11);
        assert_eq!(file["url"], "https://mybucket.oss-cn.example.com/docs/a.txt");

        let response = app.clone().oneshot(get("/files/docs/a.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"a.txt\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello world");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/files/docs/a.txt")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/files/docs/a.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = json_body(response).await;
        assert_eq!(error["code"], "NotFoundError");
    }

    #[tokio::test]
    async fn upload_without_name_generates_one() {
        let response = app()
            .await
            .oneshot(multipart_request("/files", "file", "photo.PNG", "not really a png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let file = json_body(response).await;
        let name = file["name"].as_str().unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), 32 + ".png".len());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let response = app()
            .await
            .oneshot(multipart_request("/files", "attachment", "a.txt", "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "InvalidArgument");
    }

    #[tokio::test]
    async fn url_lookup_does_not_touch_storage() {
        let response = app().await.oneshot(get("/url/x/y.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["url"], "https://mybucket.oss-cn.example.com/x/y.txt");
    }

    #[tokio::test]
    async fn bucket_routes() {
        let app = app().await;

        let response = app.clone().oneshot(get("/buckets/archive")).await.unwrap();
        assert_eq!(json_body(response).await["exists"], false);

        let put = Request::builder()
            .method("PUT")
            .uri("/buckets/archive")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/buckets/archive")).await.unwrap();
        assert_eq!(json_body(response).await["exists"], true);
    }

    #[tokio::test]
    async fn probes_report_ready() {
        let app = app().await;
        let response = app.clone().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
