//! Controller server

use crate::common::{ControllerConfig, Result, RuntimeConfig};
use crate::controller::http::{create_router, ControllerState};
use crate::controller::monitor::run_replacement_loop;
use crate::metadata::MetadataStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capacity of the DOWN-event channel; monitors block briefly if the
/// replacement loop falls behind.
const DOWN_CHANNEL_CAPACITY: usize = 64;

pub struct Controller {
    config: ControllerConfig,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting controller");
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Metadata: {}", self.config.metadata_path.display());
        tracing::info!("  Router: {}", self.config.router_url);
        tracing::info!(
            "  Heartbeat interval: {}s",
            self.config.heartbeat_interval_secs
        );

        let metadata = Arc::new(MetadataStore::open(&self.config.metadata_path)?);

        let runtime = RuntimeConfig::default();
        let client = reqwest::Client::builder()
            .connect_timeout(runtime.connect_timeout)
            .timeout(runtime.request_timeout)
            .build()
            .map_err(|e| crate::Error::Internal(format!("building HTTP client: {}", e)))?;

        let (down_tx, down_rx) = mpsc::channel(DOWN_CHANNEL_CAPACITY);

        let state = ControllerState {
            metadata,
            config: self.config.clone(),
            client,
            down_tx,
        };

        // Single consumer for every monitor's DOWN events
        tokio::spawn(run_replacement_loop(state.clone(), down_rx));

        let router = create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("✓ Controller ready");
        axum::serve(listener, router)
            .await
            .map_err(|e| crate::Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}
