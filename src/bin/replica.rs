use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use stratakv::common::ReplicaConfig;
use stratakv::ReplicaServer;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "stratakv-replica")]
#[command(about = "stratakv Replica Agent - WAL-backed shard host")]
struct Args {
    /// Replica id; falls back to the `id` environment variable, which
    /// is how the router passes it to spawned containers
    #[arg(long)]
    id: Option<i64>,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Data directory (shard store and WAL live underneath)
    #[arg(short, long, default_value = "./replica-data")]
    data: PathBuf,

    /// Controller base URL
    #[arg(short, long, default_value = "http://stratakv-controller:8000")]
    controller: String,

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

    let replica_id = match args.id {
        Some(id) => id,
        None => std::env::var("id")
            .context("replica id missing: pass --id or set the `id` environment variable")?
            .parse::<i64>()
            .context("the `id` environment variable is not a number")?,
    };

    tracing::info!("Starting stratakv Replica Agent (Server{})", replica_id);

    tokio::fs::create_dir_all(&args.data).await?;

    let config = ReplicaConfig {
        replica_id,
        bind_addr: args.bind,
        db_path: args.data.join("shards.db"),
        wal_dir: args.data.join("wal"),
        controller_url: args.controller,
    };

    ReplicaServer::new(config).serve().await?;

    Ok(())
}
