use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use stratakv::common::ControllerConfig;
use stratakv::Controller;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "stratakv-controller")]
#[command(about = "stratakv Controller - failure detection and primary election")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Path to the shared metadata ledger
    #[arg(short, long, default_value = "./metadata.db")]
    metadata: PathBuf,

    /// Router base URL
    #[arg(short, long, default_value = "http://localhost:5000")]
    router: String,

    /// Port replica agents listen on
    #[arg(long, default_value = "3000")]
    replica_port: u16,

    /// Seconds between heartbeat polls per replica
    #[arg(long, default_value = "5")]
    heartbeat_interval: u64,

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

    tracing::info!("Starting stratakv Controller");

    let config = ControllerConfig {
        bind_addr: args.bind,
        metadata_path: args.metadata,
        router_url: args.router,
        replica_port: args.replica_port,
        heartbeat_interval_secs: args.heartbeat_interval,
    };

    Controller::new(config).serve().await?;

    Ok(())
}
