use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use stratakv::common::RouterConfig;
use stratakv::RouterServer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "stratakv-router")]
#[command(about = "stratakv Router - client entry point for the sharded store")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Path to the shared metadata ledger
    #[arg(short, long, default_value = "./metadata.db")]
    metadata: PathBuf,

    /// Controller base URL
    #[arg(short, long, default_value = "http://localhost:8000")]
    controller: String,

    /// Port replica agents listen on
    #[arg(long, default_value = "3000")]
    replica_port: u16,

    /// Docker image used to spawn replica agents
    #[arg(long, default_value = "stratakv-replica")]
    image: String,

    /// Docker network replicas are attached to
    #[arg(long, default_value = "stratakv-network")]
    network: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting stratakv Router");

    let config = RouterConfig {
        bind_addr: args.bind,
        metadata_path: args.metadata,
        controller_url: args.controller,
        replica_port: args.replica_port,
        replica_image: args.image,
        network: args.network,
    };

    RouterServer::new(config).serve().await?;

    Ok(())
}
