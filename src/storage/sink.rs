//! Download targets

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};

/// Anything object bytes can be streamed into, with a way to set headers
/// before the first chunk arrives.
#[async_trait]
pub trait DownloadSink: Send {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()>;
}

/// Plain buffers ignore headers.
#[async_trait]
impl DownloadSink for Vec<u8> {
    fn set_header(&mut self, _name: HeaderName, _value: HeaderValue) {}

    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}
