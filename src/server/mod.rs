//! gRPC server module
//!
//! Exposes the `video_upload.VideoUploadService/Upload` client-streaming
//! method and hands each inbound stream to the upload orchestrator.

use crate::config::Config;
use crate::proto::{UploadRequest, UploadResponse, VideoUploadService, VideoUploadServiceServer};
use crate::s3::MultipartStore;
use crate::upload::UploadOrchestrator;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, warn};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// `VideoUploadService` implementation backed by an orchestrator
pub struct UploadService<S: ?Sized> {
    orchestrator: UploadOrchestrator<S>,
}

impl<S> UploadService<S>
where
    S: MultipartStore + ?Sized,
{
    pub fn new(orchestrator: UploadOrchestrator<S>) -> Self {
        Self { orchestrator }
    }
}

#[tonic::async_trait]
impl<S> VideoUploadService for UploadService<S>
where
    S: MultipartStore + ?Sized + 'static,
{
    async fn upload(
        &self,
        request: Request<Streaming<UploadRequest>>,
    ) -> Result<Response<UploadResponse>, Status> {
        if let Some(peer) = request.remote_addr() {
            tracing::debug!(peer = %peer, "Upload stream opened");
        }

        let outcome = self.orchestrator.upload(request.into_inner()).await?;
        Ok(Response::new(outcome.into()))
    }
}

/// gRPC upload server
pub struct Server<S: ?Sized> {
    config: Config,
    addr: SocketAddr,
    orchestrator: UploadOrchestrator<S>,
}

impl<S> Server<S>
where
    S: MultipartStore + ?Sized + 'static,
{
    /// Create a new server instance
    pub fn new(config: Config, store: Arc<S>) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("{}", e)))?;

        let orchestrator = UploadOrchestrator::new(store, config.upload.settings());

        Ok(Self {
            config,
            addr,
            orchestrator,
        })
    }

    /// Build the tonic service with the configured message size limit
    pub fn service(&self) -> VideoUploadServiceServer<UploadService<S>> {
        VideoUploadServiceServer::new(UploadService::new(self.orchestrator.clone()))
            .max_decoding_message_size(self.config.max_message_size())
    }

    /// Run the server until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{}: {}", self.addr, e)))?;

        self.serve_with_listener(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutting down server");
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight uploads are allowed to finish before this returns.
    pub async fn serve_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::RuntimeError(e.to_string()))?;

        info!(
            address = %local_addr,
            bucket = %self.config.s3.bucket,
            max_chunk_size = self.config.upload.max_chunk_size,
            max_message_size = self.config.max_message_size(),
            "Starting gRPC upload server"
        );

        let service = self.service();

        tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
