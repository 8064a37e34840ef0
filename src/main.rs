//! Stream Uploadr - gRPC streamed uploads into S3 multipart uploads

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stream_uploadr::metrics::server::MetricsServer;
use stream_uploadr::s3::{S3Client, S3ClientConfig};
use stream_uploadr::{config::Config, logging, server::Server};
use tracing::info;

/// Stream Uploadr - client-streamed uploads assembled into S3 multipart uploads
#[derive(Parser, Debug)]
#[command(name = "stream-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level or filter directive; overrides logging.level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format (json, pretty, compact); overrides logging.format
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    logging::init_subscriber(&config.logging)?;

    info!("Starting Stream Uploadr v{}", stream_uploadr::VERSION);
    info!(
        config = ?args.config,
        bucket = %config.s3.bucket,
        region = %config.s3.region,
        endpoint = ?config.s3.endpoint,
        static_credentials = config.s3.access_key.is_some(),
        "Loaded configuration"
    );

    let client_config = S3ClientConfig::from_config(&config.s3)?;
    let client = S3Client::new(client_config).await?;
    info!(
        region = client.region(),
        endpoint = %client.endpoint(),
        "S3 client ready"
    );

    let mut metrics_server = None;
    if config.metrics.enabled {
        let mut server = MetricsServer::new(config.metrics.address.clone());
        let addr = server.start().await?;
        info!(address = %addr, "Metrics server listening");
        metrics_server = Some(server);
    }

    let server = Server::new(config, Arc::new(client))?;
    let result = server.run().await;

    if let Some(mut metrics_server) = metrics_server {
        metrics_server.shutdown().await;
    }

    result?;
    Ok(())
}
