//! Chunk stream reader
//!
//! Wraps the inbound message stream and yields payloads in the order the
//! client sent them. The stream is finite and cannot be restarted.

use super::{UploadError, UploadSettings};
use crate::proto::UploadRequest;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tonic::{Code, Status};

/// Contents of the first message of an upload stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialRequest {
    pub file_name: String,
    /// Payload carried alongside the file name, often empty
    pub payload: Bytes,
}

/// Sequential reader over an inbound upload stream
pub struct ChunkReader<S> {
    stream: S,
    read_timeout: Option<Duration>,
    max_chunk_size: usize,
    /// Part number the next yielded chunk will be uploaded as
    next_part_number: u32,
}

impl<S> ChunkReader<S>
where
    S: Stream<Item = Result<UploadRequest, Status>> + Unpin + Send,
{
    /// Read the first message and return it together with a reader for the rest.
    ///
    /// An absent first message, a transport error before it arrives, or an
    /// empty `file_name` are all reported as
    /// [`UploadError::MissingInitialRequest`]. A first message the transport
    /// refused for its size is [`UploadError::ChunkTooLarge`] for part 1.
    pub async fn open(
        stream: S,
        settings: &UploadSettings,
    ) -> Result<(InitialRequest, Self), UploadError> {
        let mut reader = Self {
            stream,
            read_timeout: settings.chunk_read_timeout,
            max_chunk_size: settings.max_chunk_size,
            next_part_number: 1,
        };

        let first = match reader.recv().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                return Err(UploadError::MissingInitialRequest(
                    "stream closed before the first message".into(),
                ))
            }
            Err(status) if is_oversized(&status) => return Err(reader.too_large()),
            Err(status) => {
                return Err(UploadError::MissingInitialRequest(format!(
                    "error receiving initial request: {}",
                    status.message()
                )))
            }
        };

        let file_name = first.file_name.trim();
        if file_name.is_empty() {
            return Err(UploadError::MissingInitialRequest(
                "first message carries no file name".into(),
            ));
        }

        if !first.chunk.is_empty() {
            reader.next_part_number += 1;
        }

        let initial = InitialRequest {
            file_name: file_name.to_string(),
            payload: first.chunk,
        };

        Ok((initial, reader))
    }

    /// Next chunk payload, or `None` once the client has closed the stream.
    pub async fn next(&mut self) -> Result<Option<Bytes>, UploadError> {
        match self.recv().await {
            Ok(Some(message)) => {
                self.next_part_number += 1;
                Ok(Some(message.chunk))
            }
            Ok(None) => Ok(None),
            Err(status) if is_oversized(&status) => Err(self.too_large()),
            Err(status) => Err(UploadError::StreamReadFailure(status)),
        }
    }

    fn too_large(&self) -> UploadError {
        UploadError::ChunkTooLarge {
            part_number: self.next_part_number,
            size: None,
            max: self.max_chunk_size,
        }
    }

    async fn recv(&mut self) -> Result<Option<UploadRequest>, Status> {
        let item = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.stream.next())
                .await
                .map_err(|_| {
                    Status::deadline_exceeded(format!(
                        "no message received within {:?}",
                        timeout
                    ))
                })?,
            None => self.stream.next().await,
        };

        item.transpose()
    }
}

/// The decoder answers a message above its size limit with `OUT_OF_RANGE`.
/// The limit always leaves room for a full `max_chunk_size` payload, so such a
/// message carried an oversized chunk.
fn is_oversized(status: &Status) -> bool {
    status.code() == Code::OutOfRange
}
