//! gRPC Upload Integration Tests
//!
//! Drives the client-streaming `Upload` RPC against an in-process server
//! backed by an in-memory multipart store.
//!
//! ## Test Coverage
//!
//! - Ordered chunks become ordered parts and one completed object
//! - Oversized chunks are rejected and the upload aborted, including chunks
//!   the transport refuses to decode
//! - Streams without a file name never create an upload
//! - Store failures map to gRPC status codes
//! - Failed aborts surface as INTERNAL

mod common;

use common::{upload_requests, RecordingStore, TestServer, TEST_BUCKET, TEST_UPLOAD_ID};
use stream_uploadr::config::MESSAGE_OVERHEAD;
use stream_uploadr::proto::UploadRequest;
use tonic::Code;

#[tokio::test]
async fn test_upload_assembles_ordered_parts() {
    let server = TestServer::start(common::test_config(1024), RecordingStore::new()).await;
    let mut client = server.client().await;

    let requests = upload_requests(
        "clips/intro.mp4",
        vec![b"chunk-a".to_vec(), b"chunk-b".to_vec(), b"chunk-c".to_vec()],
    );

    let response = client
        .upload(tokio_stream::iter(requests))
        .await
        .expect("Upload should succeed")
        .into_inner();

    assert_eq!(response.status, "success");
    assert_eq!(response.file_name, "clips/intro.mp4");
    assert_eq!(
        response.url,
        format!("http://s3.test/{}/clips/intro.mp4", TEST_BUCKET)
    );

    let calls = server.store.calls();
    assert_eq!(
        calls.created,
        vec![("clips/intro.mp4".to_string(), "video/mp4".to_string())]
    );

    let numbers: Vec<u32> = calls.parts.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(&calls.parts[1].1[..], b"chunk-b");

    assert_eq!(calls.completed.len(), 1);
    let etags: Vec<&str> = calls.completed[0].iter().map(|p| p.etag.as_str()).collect();
    assert_eq!(etags, vec!["\"etag-1\"", "\"etag-2\"", "\"etag-3\""]);
    assert!(calls.aborted.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_first_message_payload_becomes_part_one() {
    let server = TestServer::start(common::test_config(1024), RecordingStore::new()).await;
    let mut client = server.client().await;

    let requests = vec![
        UploadRequest {
            file_name: "head.mp4".into(),
            chunk: "head".into(),
        },
        UploadRequest {
            file_name: String::new(),
            chunk: "tail".into(),
        },
    ];

    client
        .upload(tokio_stream::iter(requests))
        .await
        .expect("Upload should succeed");

    let calls = server.store.calls();
    assert_eq!(calls.parts.len(), 2);
    assert_eq!(calls.parts[0].0, 1);
    assert_eq!(&calls.parts[0].1[..], b"head");
    assert_eq!(&calls.parts[1].1[..], b"tail");

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_chunk_is_rejected_and_aborted() {
    let server = TestServer::start(common::test_config(8), RecordingStore::new()).await;
    let mut client = server.client().await;

    let requests = upload_requests("big.mp4", vec![b"small".to_vec(), vec![0u8; 64]]);

    let status = client
        .upload(tokio_stream::iter(requests))
        .await
        .expect_err("Oversized chunk should fail the upload");

    assert_eq!(status.code(), Code::InvalidArgument);

    let calls = server.store.calls();
    assert_eq!(calls.parts.len(), 1);
    assert!(calls.completed.is_empty());
    assert_eq!(calls.aborted, vec![TEST_UPLOAD_ID.to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_chunk_over_message_limit_is_invalid_argument() {
    let server = TestServer::start(common::test_config(8), RecordingStore::new()).await;
    let mut client = server.client().await;

    let requests = upload_requests(
        "huge.mp4",
        vec![b"small".to_vec(), vec![0u8; MESSAGE_OVERHEAD + 6 * 1024]],
    );

    let status = client
        .upload(tokio_stream::iter(requests))
        .await
        .expect_err("Chunk above the message limit should fail the upload");

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("Chunk 2"), "got: {}", status.message());

    let calls = server.store.calls();
    assert_eq!(calls.parts.len(), 1);
    assert!(calls.completed.is_empty());
    assert_eq!(calls.aborted, vec![TEST_UPLOAD_ID.to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_missing_file_name_is_invalid_argument() {
    let server = TestServer::start(common::test_config(1024), RecordingStore::new()).await;
    let mut client = server.client().await;

    let requests = upload_requests("", vec![b"orphan".to_vec()]);

    let status = client
        .upload(tokio_stream::iter(requests))
        .await
        .expect_err("Nameless stream should be rejected");

    assert_eq!(status.code(), Code::InvalidArgument);

    let calls = server.store.calls();
    assert!(calls.created.is_empty());
    assert!(calls.parts.is_empty());
    assert!(calls.aborted.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_create_failure_is_unavailable_without_abort() {
    let server =
        TestServer::start(common::test_config(1024), RecordingStore::failing_create()).await;
    let mut client = server.client().await;

    let status = client
        .upload(tokio_stream::iter(upload_requests(
            "clip.mp4",
            vec![b"data".to_vec()],
        )))
        .await
        .expect_err("Create failure should fail the upload");

    assert_eq!(status.code(), Code::Unavailable);
    assert!(server.store.calls().aborted.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_part_failure_aborts_upload() {
    let server =
        TestServer::start(common::test_config(1024), RecordingStore::failing_part(2)).await;
    let mut client = server.client().await;

    let status = client
        .upload(tokio_stream::iter(upload_requests(
            "clip.mp4",
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()],
        )))
        .await
        .expect_err("Part failure should fail the upload");

    assert_eq!(status.code(), Code::Unavailable);

    let calls = server.store.calls();
    assert_eq!(calls.parts.len(), 1);
    assert!(calls.completed.is_empty());
    assert_eq!(calls.aborted, vec![TEST_UPLOAD_ID.to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_failed_abort_is_internal() {
    let store = RecordingStore::failing_part(1).with_failing_abort();
    let server = TestServer::start(common::test_config(1024), store).await;
    let mut client = server.client().await;

    let status = client
        .upload(tokio_stream::iter(upload_requests(
            "clip.mp4",
            vec![b"one".to_vec()],
        )))
        .await
        .expect_err("Upload should fail");

    assert_eq!(status.code(), Code::Internal);
    assert!(status.message().contains(TEST_UPLOAD_ID));
    assert_eq!(server.store.calls().aborted.len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_uploads_are_independent() {
    let server = TestServer::start(common::test_config(1024), RecordingStore::new()).await;

    let mut first = server.client().await;
    let mut second = server.client().await;

    let (a, b) = tokio::join!(
        first.upload(tokio_stream::iter(upload_requests(
            "a.mp4",
            vec![b"a1".to_vec(), b"a2".to_vec()],
        ))),
        second.upload(tokio_stream::iter(upload_requests(
            "b.mp4",
            vec![b"b1".to_vec()],
        ))),
    );

    assert_eq!(a.unwrap().into_inner().file_name, "a.mp4");
    assert_eq!(b.unwrap().into_inner().file_name, "b.mp4");

    let calls = server.store.calls();
    assert_eq!(calls.created.len(), 2);
    assert_eq!(calls.parts.len(), 3);
    assert_eq!(calls.completed.len(), 2);

    server.stop().await;
}
