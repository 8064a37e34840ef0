//! Common Integration Test Infrastructure
//!
//! Provides shared utilities for the gRPC tests:
//! - In-memory multipart store that records every call
//! - In-process server management
//! - Request stream builders

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use stream_uploadr::config::{
    Config, LoggingConfig, MetricsConfig, S3Config, ServerConfig, UploadConfig,
};
use stream_uploadr::proto::{UploadRequest, VideoUploadServiceClient};
use stream_uploadr::s3::{MultipartStore, S3ClientError};
use stream_uploadr::server::Server;
use stream_uploadr::upload::CompletedPart;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Channel;

/// Test bucket name
pub const TEST_BUCKET: &str = "it-bucket";

/// Upload id handed out by [`RecordingStore`]
pub const TEST_UPLOAD_ID: &str = "it-upload-1";

/// Every call a [`RecordingStore`] has seen
#[derive(Debug, Default, Clone)]
pub struct StoreCalls {
    pub created: Vec<(String, String)>,
    pub parts: Vec<(u32, Bytes)>,
    pub completed: Vec<Vec<CompletedPart>>,
    pub aborted: Vec<String>,
}

/// In-memory multipart store
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<StoreCalls>,
    fail_create: bool,
    fail_part: Option<u32>,
    fail_abort: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_part(part_number: u32) -> Self {
        Self {
            fail_part: Some(part_number),
            ..Self::default()
        }
    }

    pub fn with_failing_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    pub fn calls(&self) -> StoreCalls {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultipartStore for RecordingStore {
    fn bucket(&self) -> &str {
        TEST_BUCKET
    }

    fn object_url(&self, key: &str) -> String {
        format!("http://s3.test/{}/{}", TEST_BUCKET, key)
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, S3ClientError> {
        if self.fail_create {
            return Err(S3ClientError::RequestError("create refused".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .created
            .push((key.to_string(), content_type.to_string()));
        Ok(TEST_UPLOAD_ID.to_string())
    }

    async fn upload_part(
        &self,
        _key: &str,
        _upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, S3ClientError> {
        if self.fail_part == Some(part_number) {
            return Err(S3ClientError::RequestError(format!(
                "part {} refused",
                part_number
            )));
        }
        self.calls.lock().unwrap().parts.push((part_number, body));
        Ok(format!("\"etag-{}\"", part_number))
    }

    async fn complete_multipart_upload(
        &self,
        _key: &str,
        _upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3ClientError> {
        self.calls.lock().unwrap().completed.push(parts.to_vec());
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        self.calls
            .lock()
            .unwrap()
            .aborted
            .push(upload_id.to_string());
        if self.fail_abort {
            return Err(S3ClientError::RequestError("abort refused".into()));
        }
        Ok(())
    }
}

/// Configuration for an in-process server on an ephemeral port
pub fn test_config(max_chunk_size: usize) -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            max_message_size: None,
        },
        s3: S3Config {
            bucket: TEST_BUCKET.into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            max_attempts: None,
            timeout_seconds: None,
        },
        upload: UploadConfig {
            max_chunk_size,
            ..UploadConfig::default()
        },
        metrics: MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        },
        logging: LoggingConfig::default(),
    }
}

/// Running gRPC server backed by a [`RecordingStore`]
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<RecordingStore>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: Config, store: RecordingStore) -> Self {
        let store = Arc::new(store);
        let server = Server::new(config, Arc::clone(&store)).expect("Server should build");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = server
                .serve_with_listener(listener, async {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            store,
            shutdown: Some(tx),
            handle,
        }
    }

    pub async fn client(&self) -> VideoUploadServiceClient<Channel> {
        VideoUploadServiceClient::connect(format!("http://{}", self.addr))
            .await
            .expect("Should connect to upload server")
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Build a stream: first message names the file, the rest carry `chunks`
pub fn upload_requests(file_name: &str, chunks: Vec<Vec<u8>>) -> Vec<UploadRequest> {
    let mut requests = vec![UploadRequest {
        file_name: file_name.to_string(),
        chunk: Bytes::new(),
    }];
    requests.extend(chunks.into_iter().map(|chunk| UploadRequest {
        file_name: String::new(),
        chunk: Bytes::from(chunk),
    }));
    requests
}
