//! Stream Uploadr Library
//!
//! gRPC client-streaming upload service that assembles the inbound chunks of
//! a file into a single S3 multipart upload.
//!
//! # Features
//!
//! - **Streaming**: Chunks are forwarded as parts as they arrive; nothing is
//!   buffered beyond the chunk in flight
//! - **Ordered Parts**: Part numbers follow stream order, starting at 1
//! - **Compensation**: Any failure after the upload is created aborts it, and a
//!   failed abort is reported together with its cause
//! - **S3 Compatible**: Works against AWS S3, MinIO, and LocalStack
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stream_uploadr::s3::{S3Client, S3ClientConfig};
//! use stream_uploadr::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = S3Client::new(S3ClientConfig::from_config(&config.s3)?).await?;
//!     let server = Server::new(config, Arc::new(client))?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod proto;
pub mod s3;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use upload::{UploadError, UploadErrorKind, UploadOrchestrator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
