//! S3 Client module
//!
//! Provides the object-store seam used by the upload orchestrator and its
//! AWS SDK backed implementation.
//!
//! # Example
//!
//! ```no_run
//! use stream_uploadr::s3::{MultipartStore, S3Client, S3ClientConfig};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = S3ClientConfig {
//!     bucket: "videos".to_string(),
//!     region: "us-east-1".to_string(),
//!     endpoint: None,
//!     credentials: None,
//!     max_attempts: None,
//!     timeout: None,
//! };
//!
//! let client = S3Client::new(config).await?;
//! let upload_id = client.create_multipart_upload("clip.mp4", "video/mp4").await?;
//! let etag = client
//!     .upload_part("clip.mp4", &upload_id, 1, Bytes::from("frame data"))
//!     .await?;
//! println!("Part 1 ETag: {}", etag);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | CreateMultipartUpload | `s3.create_multipart_upload` | bucket, key, content_type, upload_id |
//! | UploadPart | `s3.upload_part` | bucket, key, upload_id, part_number, bytes, etag |
//! | CompleteMultipartUpload | `s3.complete_multipart_upload` | bucket, key, upload_id, parts_count |
//! | AbortMultipartUpload | `s3.abort_multipart_upload` | bucket, key, upload_id |

pub mod credentials;

pub use credentials::{Credentials, CredentialsError, CredentialsProvider};

use crate::config::S3Config;
use crate::upload::CompletedPart;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as SdkCompletedPart};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use thiserror::Error;

/// Characters left unescaped in a single object key path segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

/// Remote multipart-upload operations for a single bucket.
///
/// Implementations must be safe to share across concurrent upload sessions;
/// none of the methods retry on behalf of the caller beyond what the
/// implementation's own transport does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MultipartStore: Send + Sync {
    /// Bucket every operation targets
    fn bucket(&self) -> &str;

    /// Public location of a finished object
    fn object_url(&self, key: &str) -> String;

    /// Start a multipart upload and return its upload id
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3ClientError>;

    /// Upload one part and return its ETag
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, S3ClientError>;

    /// Assemble the object from the given ordered parts
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3ClientError>;

    /// Cancel the upload and release any stored parts
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str)
        -> Result<(), S3ClientError>;
}

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack, ...). Forces path-style addressing.
    pub endpoint: Option<String>,
    /// Static credentials; `None` uses the SDK default provider chain
    pub credentials: Option<Credentials>,
    /// Total attempts per request including the first. `None` keeps the SDK default.
    pub max_attempts: Option<u32>,
    /// Per-operation timeout
    pub timeout: Option<Duration>,
}

impl S3ClientConfig {
    /// Build client settings from the `s3` configuration section
    pub fn from_config(config: &S3Config) -> Result<Self, CredentialsError> {
        Ok(Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            credentials: CredentialsProvider::from_config(config)?,
            max_attempts: config.max_attempts,
            timeout: config.timeout_seconds.map(Duration::from_secs),
        })
    }
}

/// S3 Client
///
/// Cheap to share: wrap in an `Arc` and hand the same instance to every
/// upload session.
pub struct S3Client {
    config: S3ClientConfig,
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    pub async fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if config.bucket.trim().is_empty() {
            return Err(S3ClientError::ConfigError("bucket must not be empty".into()));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                credentials.access_key_id(),
                credentials.secret_access_key(),
                None,
                None,
                "stream-uploadr-config",
            ));
        }

        if let Some(max_attempts) = config.max_attempts {
            if max_attempts == 0 {
                return Err(S3ClientError::ConfigError(
                    "max_attempts must be at least 1".into(),
                ));
            }
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }

        if let Some(timeout) = config.timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder().operation_timeout(timeout).build(),
            );
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            config,
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        })
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> String {
        self.config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.config.region))
    }
}

#[async_trait]
impl MultipartStore for S3Client {
    fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn object_url(&self, key: &str) -> String {
        let encoded_key = encode_key(key);
        match &self.config.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                encoded_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, encoded_key
            ),
        }
    }

    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.upload_id = tracing::field::Empty
        ),
        err
    )]
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3ClientError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| request_error("CreateMultipartUpload", e))?;

        let upload_id = output
            .upload_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| S3ClientError::ResponseError("response carried no upload id".into()))?
            .to_string();

        tracing::Span::current().record("s3.upload_id", upload_id.as_str());
        tracing::debug!(upload_id = %upload_id, "CreateMultipartUpload completed");

        Ok(upload_id)
    }

    #[tracing::instrument(
        name = "s3.upload_part",
        skip(self, body),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, S3ClientError> {
        let sdk_part_number = i32::try_from(part_number).map_err(|_| {
            S3ClientError::RequestError(format!("part number {} out of range", part_number))
        })?;

        let output = self
            .client
            .upload_part()
            .bucket(&self.config.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(sdk_part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| request_error("UploadPart", e))?;

        let etag = output
            .e_tag()
            .ok_or_else(|| {
                S3ClientError::ResponseError(format!("part {} response carried no ETag", part_number))
            })?
            .to_string();

        tracing::Span::current().record("s3.etag", etag.as_str());

        Ok(etag)
    }

    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, parts),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            parts_count = parts.len()
        ),
        err
    )]
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3ClientError> {
        let mut sdk_parts = Vec::with_capacity(parts.len());
        for part in parts {
            let part_number = i32::try_from(part.part_number).map_err(|_| {
                S3ClientError::RequestError(format!("part number {} out of range", part.part_number))
            })?;
            sdk_parts.push(
                SdkCompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(&part.etag)
                    .build(),
            );
        }

        let multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(sdk_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.config.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(multipart_upload)
            .send()
            .await
            .map_err(|e| request_error("CompleteMultipartUpload", e))?;

        Ok(())
    }

    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id
        ),
        err
    )]
    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.config.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| request_error("AbortMultipartUpload", e))?;

        Ok(())
    }
}

fn request_error<E>(operation: &str, err: E) -> S3ClientError
where
    E: std::error::Error,
{
    S3ClientError::RequestError(format!("{} failed: {}", operation, DisplayErrorContext(&err)))
}

/// Percent-encode each `/`-separated segment of an object key
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
