//! Configuration module for Stream Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! # Example
//!
//! ```yaml
//! server:
//!   address: "0.0.0.0:50051"
//! s3:
//!   bucket: "${S3_VIDEO_BUCKET_NAME}"
//!   region: "${REGION:-us-east-1}"
//!   access_key: "${ACCESS_KEY}"
//!   secret_key: "${SECRET_KEY}"
//! upload:
//!   max_chunk_size: 67108864
//!   content_type: "video/mp4"
//! logging:
//!   level: info
//!   format: json
//! ```

use crate::upload::{UploadSettings, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Bytes reserved on top of `max_chunk_size` for the rest of a gRPC message
pub const MESSAGE_OVERHEAD: usize = 64 * 1024;

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reject_unexpanded()?;

        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.bucket must not be empty".into(),
            ));
        }

        if self.s3.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.region must not be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.s3.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid s3.endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.s3.access_key.is_some() != self.s3.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "s3.access_key and s3.secret_key must be set together".into(),
            ));
        }

        if self.s3.max_attempts == Some(0) {
            return Err(ConfigError::ValidationError(
                "s3.max_attempts must be at least 1".into(),
            ));
        }

        if self.upload.max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_chunk_size must be greater than zero".into(),
            ));
        }

        if self.upload.content_type.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.content_type must not be empty".into(),
            ));
        }

        if let Some(max_message_size) = self.server.max_message_size {
            let required = self.upload.max_chunk_size.saturating_add(MESSAGE_OVERHEAD);
            if max_message_size < required {
                return Err(ConfigError::ValidationError(format!(
                    "server.max_message_size ({}) must be at least upload.max_chunk_size plus {} bytes ({})",
                    max_message_size, MESSAGE_OVERHEAD, required
                )));
            }
        }

        self.server.socket_addr()?;
        if self.metrics.enabled {
            self.metrics.address.parse::<SocketAddr>().map_err(|e| {
                ConfigError::ValidationError(format!(
                    "Invalid metrics.address '{}': {}",
                    self.metrics.address, e
                ))
            })?;
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid logging.format '{}': must be 'json', 'pretty', or 'compact'",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Fail on `${VAR}` placeholders left behind by unset variables
    fn reject_unexpanded(&self) -> Result<(), ConfigError> {
        let fields = [
            ("s3.bucket", Some(&self.s3.bucket)),
            ("s3.region", Some(&self.s3.region)),
            ("s3.endpoint", self.s3.endpoint.as_ref()),
            ("s3.access_key", self.s3.access_key.as_ref()),
            ("s3.secret_key", self.s3.secret_key.as_ref()),
            ("server.address", Some(&self.server.address)),
            ("metrics.address", Some(&self.metrics.address)),
            ("upload.content_type", Some(&self.upload.content_type)),
        ];

        for (name, value) in fields {
            if value.is_some_and(|v| v.contains("${")) {
                return Err(ConfigError::ValidationError(format!(
                    "{} references an unset environment variable",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Largest gRPC message the server accepts
    pub fn max_message_size(&self) -> usize {
        self.server
            .max_message_size
            .unwrap_or_else(|| self.upload.max_chunk_size.saturating_add(MESSAGE_OVERHEAD))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
    /// Largest decoded gRPC message. Defaults to `max_chunk_size` plus headroom.
    #[serde(default)]
    pub max_message_size: Option<usize>,
}

impl ServerConfig {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid server.address '{}': {}",
                self.address, e
            ))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
            max_message_size: None,
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0:50051".to_string()
}

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Total attempts per S3 request, including the first
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Per-operation timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Give up on a stream that sends nothing for this long. Off by default.
    #[serde(default)]
    pub chunk_read_timeout_seconds: Option<u64>,
}

impl UploadConfig {
    pub fn settings(&self) -> UploadSettings {
        UploadSettings {
            max_chunk_size: self.max_chunk_size,
            content_type: self.content_type.clone(),
            chunk_read_timeout: self.chunk_read_timeout_seconds.map(Duration::from_secs),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            content_type: default_content_type(),
            chunk_read_timeout_seconds: None,
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Logging configuration
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json", "pretty", or "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig::default(),
            s3: S3Config {
                bucket: "videos".into(),
                region: "us-east-1".into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
                max_attempts: None,
                timeout_seconds: None,
            },
            upload: UploadConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_default_upload_config() {
        let config = UploadConfig::default();
        assert_eq!(config.max_chunk_size, 64 * 1024 * 1024);
        assert_eq!(config.content_type, "video/mp4");
        assert!(config.settings().chunk_read_timeout.is_none());
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let mut config = test_config();
        config.s3.bucket = "".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_credentials_rejected() {
        let mut config = test_config();
        config.s3.access_key = Some("access".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = test_config();
        config.s3.endpoint = Some("localhost:9000".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = test_config();
        config.upload.max_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_message_size_below_chunk_size_rejected() {
        let mut config = test_config();
        config.server.max_message_size = Some(1024);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_message_size_without_headroom_rejected() {
        let mut config = test_config();
        config.upload.max_chunk_size = 1024;
        config.server.max_message_size = Some(1024);
        assert!(config.validate().is_err());

        config.server.max_message_size = Some(1024 + MESSAGE_OVERHEAD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unexpanded_placeholder_rejected() {
        let mut config = test_config();
        config.s3.access_key = Some("${ACCESS_KEY}".into());
        config.s3.secret_key = Some("${SECRET_KEY}".into());
        match config.validate() {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("s3.access_key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_server_address_rejected() {
        let mut config = test_config();
        config.server.address = "invalid".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = test_config();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_message_size_defaults_to_chunk_size_plus_overhead() {
        let config = test_config();
        assert_eq!(
            config.max_message_size(),
            config.upload.max_chunk_size + MESSAGE_OVERHEAD
        );
    }

    #[test]
    fn test_read_timeout_converts_to_duration() {
        let upload = UploadConfig {
            chunk_read_timeout_seconds: Some(30),
            ..UploadConfig::default()
        };
        assert_eq!(
            upload.settings().chunk_read_timeout,
            Some(Duration::from_secs(30))
        );
    }
}
