//! HTTP surface of the controller

use crate::common::types::{PrimaryElectRequest, ShardServersRequest, ShardServersResponse};
use crate::common::{ControllerConfig, Result};
use crate::controller::election::elect_primaries;
use crate::controller::monitor::spawn_monitor;
use crate::metadata::MetadataStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared controller state for HTTP handlers and background tasks.
#[derive(Clone)]
pub struct ControllerState {
    pub metadata: Arc<MetadataStore>,
    pub config: ControllerConfig,
    pub client: reqwest::Client,
    pub down_tx: mpsc::Sender<i64>,
}

/// Body is a bare replica id; spawns the heartbeat monitor for it.
async fn check_heartbeat(
    State(state): State<ControllerState>,
    Json(replica_id): Json<i64>,
) -> StatusCode {
    tracing::info!("monitoring heartbeat of Server{}", replica_id);
    spawn_monitor(state, replica_id);
    StatusCode::OK
}

/// Placements of one shard: the replica set plus the current primary
/// (`-1` until an election has landed).
async fn shard_servers(
    State(state): State<ControllerState>,
    Json(req): Json<ShardServersRequest>,
) -> Result<Json<ShardServersResponse>> {
    let server_ids = state.metadata.replicas_for_shard(&req.shard_id)?;
    let primary = state
        .metadata
        .primary_for_shard(&req.shard_id)?
        .unwrap_or(-1);
    Ok(Json(ShardServersResponse { server_ids, primary }))
}

/// Run an election for each listed shard. Always 200: per-shard
/// failures are logged and skipped, so the election may leave a shard's
/// primary unchanged.
async fn primary_elect(
    State(state): State<ControllerState>,
    Json(req): Json<PrimaryElectRequest>,
) -> StatusCode {
    elect_primaries(
        &state.metadata,
        &state.client,
        state.config.replica_port,
        &req.shard_ids,
    )
    .await;
    StatusCode::OK
}

/// Creates the controller HTTP router.
pub fn create_router(state: ControllerState) -> Router {
    Router::new()
        .route("/check_heartbeat", axum::routing::post(check_heartbeat))
        .route("/shard_servers", axum::routing::get(shard_servers))
        .route("/primary_elect", axum::routing::post(primary_elect))
        .with_state(state)
}
