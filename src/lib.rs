//! filestore - a single file-storage interface over local disk, S3-compatible
//! object stores and vendor cloud object stores.
//!
//! The backend is chosen once at startup from configuration; callers only
//! ever see [`storage::FileStorage`].

pub mod config;
pub mod errors;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod storage;
