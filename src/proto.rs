//! Wire types for the `video_upload.VideoUploadService` RPC.
//!
//! ```text
//! service VideoUploadService {
//!   rpc Upload(stream UploadRequest) returns (UploadResponse);
//! }
//! ```
//!
//! The first `UploadRequest` of a stream carries `file_name` (and optionally a
//! first `chunk`); every later message carries only `chunk`.

/// One message of the inbound upload stream
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadRequest {
    /// Destination object key. Only meaningful on the first message.
    #[prost(string, tag = "1")]
    pub file_name: ::prost::alloc::string::String,

    /// Chunk payload
    #[prost(bytes = "bytes", tag = "2")]
    pub chunk: ::prost::bytes::Bytes,
}

/// Terminal response of a successful upload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadResponse {
    #[prost(string, tag = "1")]
    pub status: ::prost::alloc::string::String,

    #[prost(string, tag = "2")]
    pub url: ::prost::alloc::string::String,

    #[prost(string, tag = "3")]
    pub file_name: ::prost::alloc::string::String,
}

include!(concat!(env!("OUT_DIR"), "/video_upload.VideoUploadService.rs"));

pub use video_upload_service_client::VideoUploadServiceClient;
pub use video_upload_service_server::{VideoUploadService, VideoUploadServiceServer};
