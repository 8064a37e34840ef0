//! Multipart upload orchestrator
//!
//! Drives one upload session per inbound stream:
//!
//! ```text
//! Idle ─► Initiating ─► Uploading ─┬─► Completing ─► Completed
//!              │            ▲  │    │        │
//!              │            └──┘    │        ▼
//!              ▼                    └───► Aborting ─► Failed
//!            Failed
//! ```
//!
//! Parts are uploaded strictly one at a time, in stream order. Any failure
//! after the remote upload exists triggers exactly one abort attempt; a
//! failed abort is reported together with the error that caused it.

use super::reader::ChunkReader;
use super::session::{SessionState, UploadSession};
use super::{UploadError, UploadOutcome, UploadSettings};
use crate::metrics;
use crate::proto::UploadRequest;
use crate::s3::MultipartStore;
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use std::time::Instant;
use tonic::Status;
use tracing::Instrument;

/// Streamed multipart upload orchestrator
///
/// Holds no per-upload state; one instance serves every concurrent stream.
pub struct UploadOrchestrator<S: ?Sized> {
    store: Arc<S>,
    settings: UploadSettings,
}

impl<S> Clone for UploadOrchestrator<S>
where
    S: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S> UploadOrchestrator<S>
where
    S: MultipartStore + ?Sized,
{
    /// Create an orchestrator over the given store
    pub fn new(store: Arc<S>, settings: UploadSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Consume an upload stream and assemble it into one object.
    ///
    /// Returns once the session reaches a terminal state.
    pub async fn upload<R>(&self, stream: R) -> Result<UploadOutcome, UploadError>
    where
        R: Stream<Item = Result<UploadRequest, Status>> + Unpin + Send,
    {
        let span = tracing::info_span!(
            "upload.session",
            session.id = %uuid::Uuid::new_v4(),
            s3.bucket = %self.store.bucket(),
            s3.key = tracing::field::Empty,
            s3.upload_id = tracing::field::Empty,
        );

        let started = Instant::now();
        let result = self.run(stream).instrument(span).await;
        let elapsed = started.elapsed().as_secs_f64();

        let bucket = self.store.bucket();
        match &result {
            Ok(outcome) => {
                metrics::record_upload_success(bucket, outcome.bytes_written, outcome.parts_count);
                metrics::record_upload_duration(bucket, "success", elapsed);
            }
            Err(err) => {
                metrics::record_upload_failure(bucket, err.kind());
                metrics::record_upload_duration(bucket, "failure", elapsed);
            }
        }

        result
    }

    async fn run<R>(&self, stream: R) -> Result<UploadOutcome, UploadError>
    where
        R: Stream<Item = Result<UploadRequest, Status>> + Unpin + Send,
    {
        let (initial, mut reader) = match ChunkReader::open(stream, &self.settings).await {
            Ok(opened) => opened,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected upload stream");
                return Err(err);
            }
        };

        tracing::Span::current().record("s3.key", initial.file_name.as_str());

        let mut session = UploadSession::new(initial.file_name);
        session.transition(SessionState::Initiating);

        let upload_id = match self
            .store
            .create_multipart_upload(session.object_key(), &self.settings.content_type)
            .await
        {
            Ok(upload_id) => upload_id,
            Err(e) => {
                session.transition(SessionState::Failed);
                let err = UploadError::CreateUploadFailed(e);
                tracing::warn!(error = %err, "Could not start multipart upload");
                return Err(err);
            }
        };

        tracing::Span::current().record("s3.upload_id", upload_id.as_str());
        tracing::info!(upload_id = %upload_id, "Created multipart upload");

        session.set_upload_id(upload_id.clone());
        session.transition(SessionState::Uploading);

        if let Err(err) = self
            .upload_parts(&mut session, &upload_id, initial.payload, &mut reader)
            .await
        {
            return Err(self.abort(&mut session, &upload_id, err).await);
        }

        session.transition(SessionState::Completing);
        if let Err(e) = self
            .store
            .complete_multipart_upload(session.object_key(), &upload_id, session.parts())
            .await
        {
            let err = UploadError::CompleteUploadFailed(e);
            return Err(self.abort(&mut session, &upload_id, err).await);
        }
        session.transition(SessionState::Completed);
        debug_assert!(session.state().is_terminal());

        let outcome = UploadOutcome {
            url: self.store.object_url(session.object_key()),
            object_key: session.object_key().to_string(),
            upload_id,
            parts_count: session.parts().len(),
            bytes_written: session.bytes_written(),
        };

        tracing::info!(
            parts = outcome.parts_count,
            bytes = outcome.bytes_written,
            url = %outcome.url,
            "Completed multipart upload"
        );

        Ok(outcome)
    }

    async fn upload_parts<R>(
        &self,
        session: &mut UploadSession,
        upload_id: &str,
        initial_payload: Bytes,
        reader: &mut ChunkReader<R>,
    ) -> Result<(), UploadError>
    where
        R: Stream<Item = Result<UploadRequest, Status>> + Unpin + Send,
    {
        if !initial_payload.is_empty() {
            self.upload_chunk(session, upload_id, initial_payload).await?;
        }

        while let Some(chunk) = reader.next().await? {
            self.upload_chunk(session, upload_id, chunk).await?;
        }

        tracing::debug!(parts = session.parts().len(), "End of upload stream");
        Ok(())
    }

    async fn upload_chunk(
        &self,
        session: &mut UploadSession,
        upload_id: &str,
        chunk: Bytes,
    ) -> Result<(), UploadError> {
        let part_number = session.next_part_number();
        let size = chunk.len();

        if size > self.settings.max_chunk_size {
            return Err(UploadError::ChunkTooLarge {
                part_number,
                size: Some(size),
                max: self.settings.max_chunk_size,
            });
        }

        let etag = self
            .store
            .upload_part(session.object_key(), upload_id, part_number, chunk)
            .await
            .map_err(|source| UploadError::UploadPartFailed {
                part_number,
                source,
            })?;

        let part = session.record_part(etag, size);
        tracing::info!(
            part_number = part.part_number,
            etag = %part.etag,
            bytes = size,
            "Uploaded part"
        );

        Ok(())
    }

    /// Attempt the abort once and fold its result into the reported error
    async fn abort(
        &self,
        session: &mut UploadSession,
        upload_id: &str,
        err: UploadError,
    ) -> UploadError {
        session.transition(SessionState::Aborting);
        tracing::warn!(
            error = %err,
            kind = err.kind().as_str(),
            parts = session.parts().len(),
            "Upload failed, aborting multipart upload"
        );

        let result = self
            .store
            .abort_multipart_upload(session.object_key(), upload_id)
            .await;
        session.transition(SessionState::Failed);
        debug_assert!(session.state().is_terminal());

        match result {
            Ok(()) => {
                metrics::record_abort(true);
                tracing::info!(upload_id = %upload_id, "Aborted multipart upload");
                err
            }
            Err(abort) => {
                metrics::record_abort(false);
                tracing::error!(
                    upload_id = %upload_id,
                    error = %abort,
                    "Failed to abort multipart upload; incomplete upload left in bucket"
                );
                UploadError::AbortUploadFailed {
                    original: Box::new(err),
                    upload_id: upload_id.to_string(),
                    abort,
                }
            }
        }
    }
}
