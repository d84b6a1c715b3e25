//! Upload inputs and the descriptor returned for a stored file

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::path::Path;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, StorageError};

/// Stream of body chunks feeding an upload
pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

/// Metadata record for one stored file.
///
/// Built by the backend once the object has been written; there are no
/// setters, so a descriptor handed to a caller never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_name: Option<String>,
    size: u64,
    content_type: String,
    url: String,
}

impl FileDescriptor {
    pub(crate) fn new(
        name: String,
        original_name: Option<String>,
        size: u64,
        content_type: String,
        url: String,
    ) -> Self {
        Self {
            name,
            original_name,
            size,
            content_type,
            url,
        }
    }

    /// Object name, unique within its bucket
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name the client uploaded under, if any
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A source of bytes plus the metadata that came with it
pub struct UploadSource<'a> {
    stream: ByteStream<'a>,
    filename: Option<String>,
    content_type: Option<String>,
    object_name: Option<String>,
}

impl<'a> UploadSource<'a> {
    pub fn new(stream: ByteStream<'a>) -> Self {
        Self {
            stream,
            filename: None,
            content_type: None,
            object_name: None,
        }
    }

    /// Single-chunk source over an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> UploadSource<'static> {
        let data = data.into();
        UploadSource::new(stream::once(async move { Ok(data) }).boxed())
    }

    /// File name as sent by the client; its extension is kept on generated names
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Store under exactly this name instead of a generated one
    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = Some(name.into());
        self
    }

    /// Resolve the object name and content type, validating a supplied name
    pub(crate) fn prepare(self) -> Result<PreparedUpload<'a>> {
        let filename = self.filename.filter(|f| !f.trim().is_empty());

        let name = match self.object_name {
            Some(name) => {
                validate_object_name(&name)?;
                name
            }
            None => generate_object_name(filename.as_deref()),
        };

        let content_type = match self.content_type.filter(|c| !c.trim().is_empty()) {
            Some(content_type) => content_type,
            None => content_type_for(filename.as_deref().unwrap_or(&name)),
        };

        Ok(PreparedUpload {
            name,
            original_name: filename,
            content_type,
            stream: self.stream,
        })
    }
}

/// Upload with its final name and content type settled
pub(crate) struct PreparedUpload<'a> {
    pub name: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub stream: ByteStream<'a>,
}

/// Collision-resistant object name: a v4 UUID plus the original extension
pub fn generate_object_name(filename: Option<&str>) -> String {
    let extension = filename
        .and_then(|f| std::path::Path::new(f).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 16)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{}{}", Uuid::new_v4().simple(), extension)
}

/// Check an object name and convert it to a store path.
///
/// Names must be non-blank, relative, and free of empty, `.` or `..`
/// segments.
pub fn validate_object_name(name: &str) -> Result<Path> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidArgument(
            "object name must not be blank".to_string(),
        ));
    }
    if name.starts_with('/') {
        return Err(StorageError::InvalidArgument(format!(
            "object name `{}` must not start with '/'",
            name
        )));
    }
    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidArgument(format!(
            "object name `{}` contains an empty or relative segment",
            name
        )));
    }

    Path::parse(name).map_err(|e| {
        StorageError::InvalidArgument(format!("invalid object name `{}`: {}", name, e))
    })
}

/// Content type guessed from a file or object name
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
        .to_string()
}

/// Drain a stream into one buffer, refusing to grow past `limit` bytes
pub(crate) async fn collect_limited(mut stream: ByteStream<'_>, limit: usize) -> Result<Bytes> {
    let mut buffer = bytes::BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(error = %e, "Upload stream failed");
            StorageError::Upload("upload stream was interrupted".to_string())
        })?;
        if buffer.len() + chunk.len() > limit {
            return Err(StorageError::Upload(format!(
                "file exceeds the {} byte upload limit",
                limit
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
