//! Configuration management for filestore
//!
//! Supports configuration via:
//! - Environment variables (primary)
//! - Optional TOML config file (secondary)
//!
//! Environment variables take precedence over config file values. Backend
//! settings are validated once, when the storage facade is built; see
//! [`StorageConfig::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::errors::{Result, StorageError};

/// Storage backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Directories on local disk
    Local,
    /// AWS S3 or any S3-compatible store (MinIO, Ceph, ...)
    S3,
    /// Vendor cloud object store addressed as `{bucket}.{endpoint}`
    Oss,
    /// In-process store, for development and tests
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Oss => "oss",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "disk" | "fs" => Ok(BackendKind::Local),
            "s3" | "aws" | "minio" => Ok(BackendKind::S3),
            "oss" | "aliyun" => Ok(BackendKind::Oss),
            "memory" | "mem" => Ok(BackendKind::Memory),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

/// Local disk backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding one sub-directory per bucket
    pub root_path: String,

    /// Public base URL objects are served under
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Bucket used for uploads
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root_path: "./data".to_string(),
            base_url: default_local_base_url(),
            bucket: default_bucket(),
        }
    }
}

/// S3-compatible backend settings
///
/// When neither key is set the default AWS credential chain is used.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint URL (MinIO and friends)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Permit plain `http://` endpoints
    #[serde(default)]
    pub allow_http: bool,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| REDACTED))
            .field("secret_key", &self.secret_key.as_ref().map(|_| REDACTED))
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

/// Vendor cloud object store settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OssConfig {
    pub access_key: String,
    pub secret_key: String,

    /// Bare host name, e.g. `oss-cn-hangzhou.aliyuncs.com`
    pub endpoint: String,

    pub bucket: String,

    /// Signing region; derived from the endpoint's first label when unset
    #[serde(default)]
    pub region: Option<String>,
}

impl OssConfig {
    /// Signing region, e.g. `oss-cn-hangzhou` for `oss-cn-hangzhou.aliyuncs.com`
    pub fn signing_region(&self) -> String {
        match &self.region {
            Some(region) => region.clone(),
            None => self
                .endpoint
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl fmt::Debug for OssConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssConfig")
            .field("access_key", &REDACTED)
            .field("secret_key", &REDACTED)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// In-memory backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub endpoint: String,
    pub bucket: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            endpoint: "memory.localhost".to_string(),
            bucket: default_bucket(),
        }
    }
}

/// Network client tuning shared by all backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds (default: 5)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum in-flight I/O calls per backend (default: 64)
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Storage configuration: the backend switch plus per-backend sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind (local, s3, oss, memory)
    #[serde(rename = "type")]
    pub kind: BackendKind,

    #[serde(default)]
    pub local: Option<LocalConfig>,

    #[serde(default)]
    pub s3: Option<S3Config>,

    #[serde(default)]
    pub oss: Option<OssConfig>,

    #[serde(default)]
    pub memory: Option<MemoryConfig>,

    #[serde(default)]
    pub client: ClientConfig,

    /// Largest accepted upload in bytes (default: 100MB)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,

    /// Create the configured bucket at startup when missing
    #[serde(default)]
    pub auto_create_bucket: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            local: Some(LocalConfig::default()),
            s3: None,
            oss: None,
            memory: None,
            client: ClientConfig::default(),
            max_upload_size: default_max_upload_size(),
            auto_create_bucket: false,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Request timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

const REDACTED: &str = "***";

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bucket() -> String {
    "default".to_string()
}

fn default_local_base_url() -> String {
    "http://localhost:8080/files".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_max_concurrent_requests() -> usize {
    64
}

fn default_max_upload_size() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StorageError::config(key, format!("cannot parse `{}`: {}", value, e)))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - FILESTORE_CONFIG_FILE: optional path to TOML config file
    /// - FILESTORE_BIND_ADDRESS: server bind address (default: 0.0.0.0:8080)
    /// - FILESTORE_TIMEOUT_SECS: request timeout (default: 300)
    /// - FILESTORE_LOG_LEVEL: log level (default: info)
    /// - FILESTORE_STORAGE_TYPE: local|s3|oss|memory
    /// - FILESTORE_MAX_UPLOAD_SIZE: max upload size in bytes (default: 100MB)
    /// - FILESTORE_AUTO_CREATE_BUCKET: create the bucket at startup (default: false)
    /// - FILESTORE_REQUEST_TIMEOUT_SECS, FILESTORE_CONNECT_TIMEOUT_SECS,
    ///   FILESTORE_MAX_CONCURRENT_REQUESTS: backend client tuning
    /// - FILESTORE_LOCAL_{ROOT_PATH,BASE_URL,BUCKET}
    /// - FILESTORE_S3_{BUCKET,REGION,ENDPOINT,ACCESS_KEY,SECRET_KEY,ALLOW_HTTP}
    /// - FILESTORE_OSS_{ACCESS_KEY,SECRET_KEY,ENDPOINT,BUCKET,REGION}
    /// - FILESTORE_MEMORY_{ENDPOINT,BUCKET}
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("FILESTORE_CONFIG_FILE") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(addr) = lookup("FILESTORE_BIND_ADDRESS") {
            config.server.bind_address = parse("FILESTORE_BIND_ADDRESS", &addr)?;
        }
        if let Some(timeout) = lookup("FILESTORE_TIMEOUT_SECS") {
            config.server.timeout_secs = parse("FILESTORE_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(level) = lookup("FILESTORE_LOG_LEVEL") {
            config.log_level = level;
        }

        config.storage.apply_overrides(&lookup)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::config(
                "FILESTORE_CONFIG_FILE",
                format!("cannot read {}: {}", path, e),
            )
        })?;
        toml::from_str(&content).map_err(|e| {
            StorageError::config(
                "FILESTORE_CONFIG_FILE",
                format!("{} is not a valid config file: {}", path, e.message()),
            )
        })
    }
}

impl StorageConfig {
    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("FILESTORE_STORAGE_TYPE") {
            self.kind = BackendKind::from_str(&kind)
                .map_err(|e| StorageError::config("FILESTORE_STORAGE_TYPE", e))?;
        }
        if let Some(size) = lookup("FILESTORE_MAX_UPLOAD_SIZE") {
            self.max_upload_size = parse("FILESTORE_MAX_UPLOAD_SIZE", &size)?;
        }
        if let Some(flag) = lookup("FILESTORE_AUTO_CREATE_BUCKET") {
            self.auto_create_bucket = parse("FILESTORE_AUTO_CREATE_BUCKET", &flag)?;
        }
        if let Some(secs) = lookup("FILESTORE_REQUEST_TIMEOUT_SECS") {
            self.client.request_timeout_secs = parse("FILESTORE_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("FILESTORE_CONNECT_TIMEOUT_SECS") {
            self.client.connect_timeout_secs = parse("FILESTORE_CONNECT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(n) = lookup("FILESTORE_MAX_CONCURRENT_REQUESTS") {
            self.client.max_concurrent_requests = parse("FILESTORE_MAX_CONCURRENT_REQUESTS", &n)?;
        }

        if let Some(root) = lookup("FILESTORE_LOCAL_ROOT_PATH") {
            self.local.get_or_insert_with(LocalConfig::default).root_path = root;
        }
        if let Some(base_url) = lookup("FILESTORE_LOCAL_BASE_URL") {
            self.local.get_or_insert_with(LocalConfig::default).base_url = base_url;
        }
        if let Some(bucket) = lookup("FILESTORE_LOCAL_BUCKET") {
            self.local.get_or_insert_with(LocalConfig::default).bucket = bucket;
        }

        if let Some(bucket) = lookup("FILESTORE_S3_BUCKET") {
            self.s3_mut().bucket = bucket;
        }
        if let Some(region) = lookup("FILESTORE_S3_REGION") {
            self.s3_mut().region = region;
        }
        if let Some(endpoint) = lookup("FILESTORE_S3_ENDPOINT") {
            self.s3_mut().endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("FILESTORE_S3_ACCESS_KEY") {
            self.s3_mut().access_key = Some(key);
        }
        if let Some(secret) = lookup("FILESTORE_S3_SECRET_KEY") {
            self.s3_mut().secret_key = Some(secret);
        }
        if let Some(flag) = lookup("FILESTORE_S3_ALLOW_HTTP") {
            self.s3_mut().allow_http = parse("FILESTORE_S3_ALLOW_HTTP", &flag)?;
        }

        if let Some(key) = lookup("FILESTORE_OSS_ACCESS_KEY") {
            self.oss.get_or_insert_with(OssConfig::default).access_key = key;
        }
        if let Some(secret) = lookup("FILESTORE_OSS_SECRET_KEY") {
            self.oss.get_or_insert_with(OssConfig::default).secret_key = secret;
        }
        if let Some(endpoint) = lookup("FILESTORE_OSS_ENDPOINT") {
            self.oss.get_or_insert_with(OssConfig::default).endpoint = endpoint;
        }
        if let Some(bucket) = lookup("FILESTORE_OSS_BUCKET") {
            self.oss.get_or_insert_with(OssConfig::default).bucket = bucket;
        }
        if let Some(region) = lookup("FILESTORE_OSS_REGION") {
            self.oss.get_or_insert_with(OssConfig::default).region = Some(region);
        }

        if let Some(endpoint) = lookup("FILESTORE_MEMORY_ENDPOINT") {
            self.memory.get_or_insert_with(MemoryConfig::default).endpoint = endpoint;
        }
        if let Some(bucket) = lookup("FILESTORE_MEMORY_BUCKET") {
            self.memory.get_or_insert_with(MemoryConfig::default).bucket = bucket;
        }

        Ok(())
    }

    fn s3_mut(&mut self) -> &mut S3Config {
        self.s3.get_or_insert_with(|| S3Config {
            region: default_region(),
            ..S3Config::default()
        })
    }

    /// Bucket uploads go to for the selected backend, if its section is present
    pub fn bucket(&self) -> Option<&str> {
        match self.kind {
            BackendKind::Local => self.local.as_ref().map(|c| c.bucket.as_str()),
            BackendKind::S3 => self.s3.as_ref().map(|c| c.bucket.as_str()),
            BackendKind::Oss => self.oss.as_ref().map(|c| c.bucket.as_str()),
            BackendKind::Memory => self.memory.as_ref().map(|c| c.bucket.as_str()),
        }
    }

    /// Validate the selected backend's settings.
    ///
    /// Only the section matching `kind` is checked; the others may be absent
    /// or incomplete.
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_size == 0 {
            return Err(StorageError::config(
                "storage.max_upload_size",
                "must be greater than zero",
            ));
        }
        self.client.validate()?;

        match self.kind {
            BackendKind::Local => section(&self.local, "storage.local", "FILESTORE_LOCAL_ROOT_PATH")?.validate(),
            BackendKind::S3 => section(&self.s3, "storage.s3", "FILESTORE_S3_BUCKET")?.validate(),
            BackendKind::Oss => section(&self.oss, "storage.oss", "FILESTORE_OSS_*")?.validate(),
            BackendKind::Memory => section(&self.memory, "storage.memory", "FILESTORE_MEMORY_*")?.validate(),
        }
    }
}

fn section<'a, T>(value: &'a Option<T>, name: &str, env: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| {
        StorageError::config(
            name,
            format!("section is missing; add [{}] to the config file or set {}", name, env),
        )
    })
}

fn require(setting: &str, value: &str, hint: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StorageError::config(setting, hint));
    }
    Ok(())
}

/// Bucket naming rules shared by the object-store backends: 3-63 characters
/// of lowercase letters, digits, `-` and `.`, starting and ending with a
/// letter or digit.
pub fn check_bucket_name(setting: &str, bucket: &str) -> Result<()> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let edges_ok = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if !(3..=63).contains(&bucket.len()) || !valid_chars || !edges_ok {
        return Err(StorageError::config(
            setting,
            format!(
                "`{}` is not a valid bucket name; use 3-63 lowercase letters, digits, '-' or '.'",
                bucket
            ),
        ));
    }
    Ok(())
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(StorageError::config(
                "storage.client.max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(StorageError::config(
                "storage.client",
                "timeouts must be at least one second",
            ));
        }
        Ok(())
    }
}

impl LocalConfig {
    pub fn validate(&self) -> Result<()> {
        require(
            "storage.local.root_path",
            &self.root_path,
            "set the directory files are stored under",
        )?;
        url::Url::parse(&self.base_url).map_err(|e| {
            StorageError::config(
                "storage.local.base_url",
                format!("`{}` is not an absolute URL: {}", self.base_url, e),
            )
        })?;
        require("storage.local.bucket", &self.bucket, "set the bucket directory name")?;
        if self.bucket.contains(['/', '\\']) || self.bucket.contains("..") {
            return Err(StorageError::config(
                "storage.local.bucket",
                "must be a single directory name",
            ));
        }
        Ok(())
    }
}

impl S3Config {
    pub fn validate(&self) -> Result<()> {
        check_bucket_name("storage.s3.bucket", &self.bucket)?;
        require("storage.s3.region", &self.region, "set the region, e.g. us-east-1")?;

        if let Some(endpoint) = &self.endpoint {
            let parsed = url::Url::parse(endpoint).map_err(|e| {
                StorageError::config(
                    "storage.s3.endpoint",
                    format!("`{}` is not a URL: {}", endpoint, e),
                )
            })?;
            match parsed.scheme() {
                "https" => {}
                "http" if self.allow_http => {}
                "http" => {
                    return Err(StorageError::config(
                        "storage.s3.endpoint",
                        "plain http endpoints require storage.s3.allow_http = true",
                    ))
                }
                other => {
                    return Err(StorageError::config(
                        "storage.s3.endpoint",
                        format!("unsupported scheme `{}`; use http or https", other),
                    ))
                }
            }
        }

        match (&self.access_key, &self.secret_key) {
            (Some(_), None) | (None, Some(_)) => Err(StorageError::config(
                "storage.s3.access_key",
                "access_key and secret_key must be set together, or both left unset to use the default credential chain",
            )),
            _ => Ok(()),
        }
    }
}

impl OssConfig {
    pub fn validate(&self) -> Result<()> {
        require("storage.oss.access_key", &self.access_key, "set the access key id")?;
        require("storage.oss.secret_key", &self.secret_key, "set the access key secret")?;
        require(
            "storage.oss.endpoint",
            &self.endpoint,
            "set the endpoint host, e.g. oss-cn-hangzhou.aliyuncs.com",
        )?;
        if self.endpoint.contains("://") || self.endpoint.contains('/') {
            return Err(StorageError::config(
                "storage.oss.endpoint",
                format!(
                    "`{}` must be a bare host name such as oss-cn-hangzhou.aliyuncs.com, without scheme or path",
                    self.endpoint
                ),
            ));
        }
        check_bucket_name("storage.oss.bucket", &self.bucket)?;
        require(
            "storage.oss.region",
            &self.signing_region(),
            "set the signing region, e.g. oss-cn-hangzhou",
        )
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        require("storage.memory.endpoint", &self.endpoint, "set the endpoint host used in URLs")?;
        check_bucket_name("storage.memory.bucket", &self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn oss() -> OssConfig {
        OssConfig {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
            bucket: "mybucket".to_string(),
            region: None,
        }
    }

    fn setting_of(err: StorageError) -> String {
        match err {
            StorageError::Configuration { setting, .. } => setting,
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!(BackendKind::from_str("local").unwrap(), BackendKind::Local);
        assert_eq!(BackendKind::from_str("MinIO").unwrap(), BackendKind::S3);
        assert_eq!(BackendKind::from_str("aliyun").unwrap(), BackendKind::Oss);
        assert_eq!(BackendKind::from_str("memory").unwrap(), BackendKind::Memory);
        assert!(BackendKind::from_str("ftp").is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.storage.kind, BackendKind::Local);
        config.storage.validate().unwrap();
    }

    #[test]
    fn env_overrides_select_and_fill_backend() {
        let config = Config::from_lookup(lookup(&[
            ("FILESTORE_STORAGE_TYPE", "oss"),
            ("FILESTORE_OSS_ACCESS_KEY", "ak"),
            ("FILESTORE_OSS_SECRET_KEY", "sk"),
            ("FILESTORE_OSS_ENDPOINT", "oss-cn.example.com"),
            ("FILESTORE_OSS_BUCKET", "mybucket"),
            ("FILESTORE_MAX_CONCURRENT_REQUESTS", "8"),
        ]))
        .unwrap();

        assert_eq!(config.storage.kind, BackendKind::Oss);
        assert_eq!(config.storage.bucket(), Some("mybucket"));
        assert_eq!(config.storage.client.max_concurrent_requests, 8);
        config.storage.validate().unwrap();
    }

    #[test]
    fn unparsable_env_value_names_the_variable() {
        let err = Config::from_lookup(lookup(&[("FILESTORE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(setting_of(err), "FILESTORE_TIMEOUT_SECS");
    }

    #[test]
    fn missing_section_is_reported() {
        let storage = StorageConfig {
            kind: BackendKind::Oss,
            ..StorageConfig::default()
        };
        assert_eq!(setting_of(storage.validate().unwrap_err()), "storage.oss");
    }

    #[test]
    fn oss_requires_credentials() {
        let config = OssConfig {
            access_key: "  ".to_string(),
            ..oss()
        };
        assert_eq!(setting_of(config.validate().unwrap_err()), "storage.oss.access_key");
    }

    #[test]
    fn oss_endpoint_must_be_bare_host() {
        let config = OssConfig {
            endpoint: "https://oss-cn-hangzhou.aliyuncs.com".to_string(),
            ..oss()
        };
        assert_eq!(setting_of(config.validate().unwrap_err()), "storage.oss.endpoint");
        assert_eq!(oss().signing_region(), "oss-cn-hangzhou");
    }

    #[test]
    fn bucket_names_are_checked() {
        assert!(check_bucket_name("b", "mybucket").is_ok());
        assert!(check_bucket_name("b", "my.bucket-01").is_ok());
        assert!(check_bucket_name("b", "ab").is_err());
        assert!(check_bucket_name("b", "MyBucket").is_err());
        assert!(check_bucket_name("b", "-bucket").is_err());
        assert!(check_bucket_name("b", "bucket_1").is_err());
    }

    #[test]
    fn s3_keys_must_come_in_pairs() {
        let config = S3Config {
            bucket: "media".to_string(),
            region: "us-east-1".to_string(),
            access_key: Some("ak".to_string()),
            ..S3Config::default()
        };
        assert_eq!(setting_of(config.validate().unwrap_err()), "storage.s3.access_key");
    }

    #[test]
    fn s3_http_endpoint_needs_opt_in() {
        let mut config = S3Config {
            bucket: "media".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            ..S3Config::default()
        };
        assert!(config.validate().is_err());
        config.allow_http = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let rendered = format!("{:?}", oss());
        assert!(!rendered.contains("\"sk\""));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn toml_file_round_trip() {
        let raw = r#"
            log_level = "debug"

            [storage]
            type = "memory"

            [storage.memory]
            endpoint = "oss-cn.example.com"
            bucket = "mybucket"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.storage.kind, BackendKind::Memory);
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.storage.client, ClientConfig::default());
        config.storage.validate().unwrap();
    }
}
