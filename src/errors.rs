//! Error types for filestore
//!
//! Every backend translates its provider-specific failures into one of the
//! `StorageError` kinds below. Provider errors never cross the storage
//! interface: the original cause is logged where it is mapped and only a
//! user-safe message travels with the error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Business-level storage error kinds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Invalid backend settings, raised at construction time only
    #[error("Configuration error in `{setting}`: {hint}")]
    Configuration { setting: String, hint: String },

    /// The backend could not be reached
    #[error("Backend unreachable: {0}")]
    Connectivity(String),

    /// The credentials were rejected or lack the required grant
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Object or bucket not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    /// Catch-all for provider failures with no better classification
    #[error("Unknown backend error: {0}")]
    Unknown(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage operation, used to pick an error kind and label logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BucketExists,
    MakeBucket,
    Upload,
    Delete,
    Download,
    GetUrl,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::BucketExists => "bucket_exists",
            Operation::MakeBucket => "make_bucket",
            Operation::Upload => "upload",
            Operation::Delete => "delete",
            Operation::Download => "download",
            Operation::GetUrl => "get_url",
        }
    }

    /// Error kind used for transport failures of this operation
    fn failure(&self, message: String) -> StorageError {
        match self {
            Operation::Upload => StorageError::Upload(message),
            Operation::Download => StorageError::Download(message),
            Operation::Delete => StorageError::Delete(message),
            Operation::BucketExists | Operation::MakeBucket | Operation::GetUrl => {
                StorageError::Unknown(message)
            }
        }
    }
}

impl StorageError {
    pub fn config(setting: impl Into<String>, hint: impl Into<String>) -> Self {
        StorageError::Configuration {
            setting: setting.into(),
            hint: hint.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Configuration { .. } => "ConfigurationError",
            StorageError::Connectivity(_) => "ConnectivityError",
            StorageError::Permission(_) => "PermissionError",
            StorageError::NotFound(_) => "NotFoundError",
            StorageError::InvalidArgument(_) => "InvalidArgument",
            StorageError::Upload(_) => "UploadError",
            StorageError::Download(_) => "DownloadError",
            StorageError::Delete(_) => "DeleteError",
            StorageError::Unknown(_) => "UnknownBackendError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StorageError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            StorageError::Permission(_) => StatusCode::FORBIDDEN,
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map an `object_store` failure for `name` into the taxonomy.
    ///
    /// The full provider error is logged here; the returned error carries
    /// only the object name and a generic description.
    pub fn from_object_store(
        backend: &str,
        op: Operation,
        name: &str,
        err: object_store::Error,
    ) -> Self {
        match err {
            object_store::Error::NotFound { .. } => {
                warn!(backend, operation = op.as_str(), object = %name, "Object not found");
                StorageError::NotFound(name.to_string())
            }
            object_store::Error::InvalidPath { source } => {
                warn!(backend, operation = op.as_str(), object = %name, error = %source, "Invalid object path");
                StorageError::InvalidArgument(format!("invalid object name `{}`", name))
            }
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => {
                error!(backend, operation = op.as_str(), object = %name, error = %err, "Backend rejected credentials");
                StorageError::Permission(format!("{} of `{}` was not permitted", op.as_str(), name))
            }
            err @ (object_store::Error::NotImplemented
            | object_store::Error::NotSupported { .. }
            | object_store::Error::UnknownConfigurationKey { .. }
            | object_store::Error::JoinError { .. }) => {
                error!(backend, operation = op.as_str(), object = %name, error = %err, "Unclassified backend failure");
                StorageError::Unknown(format!("{} of `{}` failed", op.as_str(), name))
            }
            err => {
                error!(backend, operation = op.as_str(), object = %name, error = %err, "Storage operation failed");
                op.failure(format!("{} of `{}` failed", op.as_str(), name))
            }
        }
    }

    /// Map a local filesystem failure on a bucket directory
    pub fn from_io(backend: &str, op: Operation, target: &str, err: std::io::Error) -> Self {
        error!(backend, operation = op.as_str(), target = %target, error = %err, "Filesystem operation failed");
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                StorageError::Permission(format!("{} of `{}` was not permitted", op.as_str(), target))
            }
            _ => StorageError::Unknown(format!("{} of `{}` failed", op.as_str(), target)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic() -> object_store::Error {
        object_store::Error::Generic {
            store: "S3",
            source: "connection reset by peer".into(),
        }
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = object_store::Error::NotFound {
            path: "a.txt".to_string(),
            source: "404".into(),
        };
        assert_eq!(
            StorageError::from_object_store("test", Operation::Download, "a.txt", err),
            StorageError::NotFound("a.txt".to_string())
        );
    }

    #[test]
    fn transport_failures_map_to_the_operation_kind() {
        assert!(matches!(
            StorageError::from_object_store("test", Operation::Upload, "a", generic()),
            StorageError::Upload(_)
        ));
        assert!(matches!(
            StorageError::from_object_store("test", Operation::Download, "a", generic()),
            StorageError::Download(_)
        ));
        assert!(matches!(
            StorageError::from_object_store("test", Operation::Delete, "a", generic()),
            StorageError::Delete(_)
        ));
    }

    #[test]
    fn permission_and_unimplemented_are_classified() {
        let denied = object_store::Error::PermissionDenied {
            path: "a".to_string(),
            source: "403".into(),
        };
        assert!(matches!(
            StorageError::from_object_store("test", Operation::Upload, "a", denied),
            StorageError::Permission(_)
        ));
        assert!(matches!(
            StorageError::from_object_store("test", Operation::Upload, "a", object_store::Error::NotImplemented),
            StorageError::Unknown(_)
        ));
    }

    #[test]
    fn messages_do_not_leak_provider_detail() {
        let err = StorageError::from_object_store("test", Operation::Upload, "a.txt", generic());
        assert!(!err.to_string().contains("connection reset"));
    }

    #[test]
    fn io_permission_denied_maps_to_permission() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            StorageError::from_io("local", Operation::MakeBucket, "b", err),
            StorageError::Permission(_)
        ));
    }

    #[test]
    fn status_codes() {
        assert_eq!(StorageError::InvalidArgument("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(StorageError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(StorageError::Permission("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            StorageError::Connectivity("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            StorageError::Upload("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn configuration_error_names_the_setting() {
        let err = StorageError::config("oss.endpoint", "use a bare host name");
        assert_eq!(err.code(), "ConfigurationError");
        assert!(err.to_string().contains("oss.endpoint"));
        assert!(err.to_string().contains("bare host"));
    }
}
