//! Router server

use crate::common::{Result, RouterConfig};
use crate::metadata::MetadataStore;
use crate::router::deploy::{Deployer, DockerDeployer};
use crate::router::http::create_router;
use crate::router::peers::PeerClient;
use crate::router::state::RouterState;
use std::sync::Arc;

pub struct RouterServer {
    config: RouterConfig,
    deployer: Arc<dyn Deployer>,
}

impl RouterServer {
    pub fn new(config: RouterConfig) -> Self {
        let deployer = Arc::new(DockerDeployer::new(
            config.replica_image.clone(),
            config.network.clone(),
        ));
        Self { config, deployer }
    }

    /// Use a custom container-lifecycle implementation (tests,
    /// externally-managed fleets).
    pub fn with_deployer(config: RouterConfig, deployer: Arc<dyn Deployer>) -> Self {
        Self { config, deployer }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting router");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Metadata: {}", self.config.metadata_path.display());
        tracing::info!("  Controller: {}", self.config.controller_url);

        let metadata = Arc::new(MetadataStore::open(&self.config.metadata_path)?);
        let peers = PeerClient::new(
            self.config.replica_port,
            self.config.controller_url.clone(),
        )?;

        let state = RouterState::new(metadata, peers, self.deployer, self.config.clone());

        // Rings and the replica list are caches of the ledger; restore
        // them before accepting traffic.
        state.hydrate().await?;

        let router = create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Router ready");
        axum::serve(listener, router)
            .await
            .map_err(|e| crate::Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}
