//! Upload session state
//!
//! One [`UploadSession`] exists per inbound stream and is owned exclusively by
//! the task handling that stream.

/// Lifecycle of an upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initiating,
    Uploading,
    Completing,
    Aborting,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Completed part info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// One in-flight multipart upload
#[derive(Debug)]
pub struct UploadSession {
    object_key: String,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    next_part_number: u32,
    bytes_written: u64,
    state: SessionState,
}

impl UploadSession {
    /// Start a session for `object_key`, before the remote upload exists
    pub fn new(object_key: impl Into<String>) -> Self {
        Self {
            object_key: object_key.into(),
            upload_id: None,
            parts: Vec::new(),
            next_part_number: 1,
            bytes_written: 0,
            state: SessionState::Idle,
        }
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    /// Upload id, once the remote upload has been created
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Parts in upload order
    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn next_part_number(&self) -> u32 {
        self.next_part_number
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn transition(&mut self, to: SessionState) {
        tracing::debug!(from = ?self.state, to = ?to, "Session state change");
        self.state = to;
    }

    pub(crate) fn set_upload_id(&mut self, upload_id: String) {
        self.upload_id = Some(upload_id);
    }

    /// Record the part just uploaded under `next_part_number` and advance the counter
    pub(crate) fn record_part(&mut self, etag: String, size: usize) -> &CompletedPart {
        self.parts.push(CompletedPart {
            part_number: self.next_part_number,
            etag,
        });
        self.next_part_number += 1;
        self.bytes_written += size as u64;
        &self.parts[self.parts.len() - 1]
    }
}
