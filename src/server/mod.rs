//! HTTP server implementation
//!
//! Sets up the Axum HTTP server with:
//! - File store routes
//! - Middleware (tracing, timeout, compression)
//! - Graceful shutdown

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Config;
use crate::routes;
use crate::storage::FileStorage;

/// Room left for multipart framing on top of the upload limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// HTTP server for the file store
pub struct Server {
    config: Config,
    storage: Arc<FileStorage>,
}

impl Server {
    pub fn new(config: Config, storage: Arc<FileStorage>) -> Self {
        Self { config, storage }
    }

    /// Build the Axum router with all middleware
    fn build_router(&self) -> Router {
        let body_limit = self
            .config
            .storage
            .max_upload_size
            .saturating_add(MULTIPART_OVERHEAD);

        routes::create_router(self.storage.clone(), body_limit).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    self.config.server.timeout_secs,
                )))
                .layer(CompressionLayer::new())
                .into_inner(),
        )
    }

    /// Start the server and run until shutdown signal
    pub async fn start<F>(&self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.server.bind_address).await?;
        info!(address = %self.config.server.bind_address, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, MemoryConfig, StorageConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_serves_probes_behind_middleware() {
        let config = Config {
            storage: StorageConfig {
                kind: BackendKind::Memory,
                local: None,
                memory: Some(MemoryConfig::default()),
                ..StorageConfig::default()
            },
            ..Config::default()
        };
        let storage = Arc::new(FileStorage::new(&config.storage).await.unwrap());
        let server = Server::new(config, storage);

        let response = server
            .build_router()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
