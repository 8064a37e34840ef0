//! Upload module
//!
//! Turns a client-streamed sequence of chunks into a single S3 multipart
//! upload.
//!
//! - [`reader::ChunkReader`] pulls chunks off the inbound stream in order.
//! - [`orchestrator::UploadOrchestrator`] drives one [`session::UploadSession`]
//!   from creation to a single terminal outcome, aborting the remote upload on
//!   any failure.

use crate::s3::S3ClientError;
use std::time::Duration;
use thiserror::Error;

pub mod orchestrator;
pub mod reader;
pub mod session;

pub use orchestrator::UploadOrchestrator;
pub use reader::{ChunkReader, InitialRequest};
pub use session::{CompletedPart, SessionState, UploadSession};

/// Default maximum chunk size (64MB)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Default content type of created objects
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Status reported in a successful response
pub const STATUS_SUCCESS: &str = "success";

/// Discriminant of [`UploadError`], for callers that branch on failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadErrorKind {
    MissingInitialRequest,
    StreamReadFailure,
    ChunkTooLarge,
    CreateUploadFailed,
    UploadPartFailed,
    CompleteUploadFailed,
    AbortUploadFailed,
}

impl UploadErrorKind {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInitialRequest => "missing_initial_request",
            Self::StreamReadFailure => "stream_read_failure",
            Self::ChunkTooLarge => "chunk_too_large",
            Self::CreateUploadFailed => "create_upload_failed",
            Self::UploadPartFailed => "upload_part_failed",
            Self::CompleteUploadFailed => "complete_upload_failed",
            Self::AbortUploadFailed => "abort_upload_failed",
        }
    }
}

/// Upload errors
///
/// Every variant is terminal for the session.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing initial request: {0}")]
    MissingInitialRequest(String),

    #[error("Failed to receive chunk: {0}")]
    StreamReadFailure(#[source] tonic::Status),

    /// `size` is `None` when the transport refused the message before it was decoded.
    #[error(
        "Chunk {part_number} is {}, exceeding the maximum of {max} bytes",
        describe_size(.size)
    )]
    ChunkTooLarge {
        part_number: u32,
        size: Option<usize>,
        max: usize,
    },

    #[error("Failed to create multipart upload: {0}")]
    CreateUploadFailed(#[source] S3ClientError),

    #[error("Failed to upload part {part_number}: {source}")]
    UploadPartFailed {
        part_number: u32,
        #[source]
        source: S3ClientError,
    },

    #[error("Failed to complete multipart upload: {0}")]
    CompleteUploadFailed(#[source] S3ClientError),

    /// Abort after `original` failed too; the store may still hold the upload.
    #[error("{original}; abort of multipart upload {upload_id} also failed: {abort}")]
    AbortUploadFailed {
        original: Box<UploadError>,
        upload_id: String,
        #[source]
        abort: S3ClientError,
    },
}

fn describe_size(size: &Option<usize>) -> String {
    match size {
        Some(size) => format!("{} bytes", size),
        None => "over the message size limit".to_string(),
    }
}

impl UploadError {
    pub fn kind(&self) -> UploadErrorKind {
        match self {
            Self::MissingInitialRequest(_) => UploadErrorKind::MissingInitialRequest,
            Self::StreamReadFailure(_) => UploadErrorKind::StreamReadFailure,
            Self::ChunkTooLarge { .. } => UploadErrorKind::ChunkTooLarge,
            Self::CreateUploadFailed(_) => UploadErrorKind::CreateUploadFailed,
            Self::UploadPartFailed { .. } => UploadErrorKind::UploadPartFailed,
            Self::CompleteUploadFailed(_) => UploadErrorKind::CompleteUploadFailed,
            Self::AbortUploadFailed { .. } => UploadErrorKind::AbortUploadFailed,
        }
    }

    /// The error that ended the session, looking through a failed abort
    pub fn original(&self) -> &UploadError {
        match self {
            Self::AbortUploadFailed { original, .. } => original,
            other => other,
        }
    }
}

impl From<UploadError> for tonic::Status {
    fn from(err: UploadError) -> Self {
        let message = err.to_string();
        match &err {
            UploadError::MissingInitialRequest(_) | UploadError::ChunkTooLarge { .. } => {
                tonic::Status::invalid_argument(message)
            }
            UploadError::StreamReadFailure(status) => tonic::Status::new(status.code(), message),
            UploadError::CreateUploadFailed(_)
            | UploadError::UploadPartFailed { .. }
            | UploadError::CompleteUploadFailed(_) => tonic::Status::unavailable(message),
            UploadError::AbortUploadFailed { .. } => tonic::Status::internal(message),
        }
    }
}

/// Per-process upload settings
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Largest accepted chunk payload in bytes
    pub max_chunk_size: usize,
    /// Content type given to created objects
    pub content_type: String,
    /// Deadline for each read from the inbound stream
    pub chunk_read_timeout: Option<Duration>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            chunk_read_timeout: None,
        }
    }
}

/// Upload result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub object_key: String,
    pub url: String,
    pub upload_id: String,
    pub parts_count: usize,
    pub bytes_written: u64,
}

impl From<UploadOutcome> for crate::proto::UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            url: outcome.url,
            file_name: outcome.object_key,
        }
    }
}
