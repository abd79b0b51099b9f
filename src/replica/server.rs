//! Replica agent server

use crate::common::{ReplicaConfig, Result, RuntimeConfig};
use crate::replica::http::{create_router, AgentState};
use crate::replica::store::ShardStore;
use crate::replica::wal::Wal;
use std::sync::Arc;

pub struct ReplicaServer {
    config: ReplicaConfig,
}

impl ReplicaServer {
    pub fn new(config: ReplicaConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting replica agent: Server{}", self.config.replica_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Shard store: {}", self.config.db_path.display());
        tracing::info!("  WAL dir: {}", self.config.wal_dir.display());
        tracing::info!("  Controller: {}", self.config.controller_url);

        let store = Arc::new(ShardStore::open(&self.config.db_path)?);
        let wal = Arc::new(Wal::new(&self.config.wal_dir));

        let runtime = RuntimeConfig::default();
        let client = reqwest::Client::builder()
            .connect_timeout(runtime.connect_timeout)
            .timeout(runtime.request_timeout)
            .build()
            .map_err(|e| crate::Error::Internal(format!("building HTTP client: {}", e)))?;

        let state = AgentState {
            replica_id: self.config.replica_id,
            store,
            wal,
            controller_url: self.config.controller_url.clone(),
            replica_port: self.config.bind_addr.port(),
            client,
        };
        let router = create_router(state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Replica agent ready");
        axum::serve(listener, router)
            .await
            .map_err(|e| crate::Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}
