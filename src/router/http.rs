//! HTTP surface of the router
//!
//! The single client entry point: admin operations (init, status, add,
//! rm), the data plane (read, write, update, del), and the two control
//! hooks the controller relies on (serverids, replace_server).

use crate::common::types::{
    AddRequest, AddResponse, DeleteRequest, InitRequest, MessageResponse, ReadRequest,
    ReadResponse, RemoveRequest, RemoveResponse, RemoveSummary, ReplaceServerRequest, ShardSpec,
    UpdateRequest, WriteRequest,
};
use crate::common::utils::{choose_random_excluding, mint_replica_id, parse_server_name, server_name};
use crate::common::{Error, Result};
use crate::router::replace;
use crate::router::state::RouterState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;

/// Spawn, configure, and register each listed replica, recording its
/// placements in the ledger. Shared by init and add.
async fn admit_servers(
    state: &RouterState,
    servers: &HashMap<String, Vec<String>>,
) -> Result<Vec<i64>> {
    let schema = state.current_schema();
    let mut admitted = Vec::new();

    for (raw_name, shard_ids) in servers {
        let replica_id = parse_server_name(raw_name);
        admitted.push(replica_id);

        for shard_id in shard_ids {
            state.metadata.insert_placement(shard_id, replica_id)?;
        }

        {
            let mut replicas = state.replicas.write().unwrap();
            if !replicas.contains(&replica_id) {
                replicas.push(replica_id);
            }
        }

        state.deployer.spawn_replica(replica_id).await?;
        state
            .peers
            .configure_replica(replica_id, &schema, shard_ids)
            .await?;

        if let Err(e) = state.peers.register_heartbeat(replica_id).await {
            tracing::warn!(
                "registering heartbeat for {} failed: {}",
                server_name(replica_id),
                e
            );
        }
    }

    Ok(admitted)
}

/// Persist new shards and build their rings from the placement rows
/// admitted just before. Shared by init and add.
async fn register_shards(state: &RouterState, shards: &[ShardSpec]) -> Result<Vec<String>> {
    let mut shard_ids = Vec::new();
    for spec in shards {
        state.metadata.insert_shard(spec)?;
        state.rebuild_ring(&spec.shard_id).await?;
        shard_ids.push(spec.shard_id.clone());
    }
    Ok(shard_ids)
}

/// "Add Server:4, Server:5 and Server:6"
fn added_servers_message(ids: &[i64]) -> String {
    let mut message = String::from("Add ");
    for (index, id) in ids.iter().enumerate() {
        message.push_str(&format!("Server:{}", id));
        if index + 2 == ids.len() {
            message.push_str(" and ");
        } else if index + 1 < ids.len() {
            message.push_str(", ");
        }
    }
    message
}

// === Admin plane ===

async fn init(
    State(state): State<RouterState>,
    Json(req): Json<InitRequest>,
) -> Result<Json<MessageResponse>> {
    *state.schema.write().unwrap() = Some(req.schema.clone());

    admit_servers(&state, &req.servers).await?;
    let shard_ids = register_shards(&state, &req.shards).await?;

    if let Err(e) = state.peers.request_election(&shard_ids).await {
        tracing::warn!("primary election after init failed: {}", e);
    }

    Ok(Json(MessageResponse::success("Configured Database")))
}

async fn status(State(state): State<RouterState>) -> Result<Json<serde_json::Value>> {
    let mut servers = serde_json::Map::new();
    for replica_id in state.replica_ids() {
        let shards = state.metadata.shards_for_replica(replica_id)?;
        servers.insert(server_name(replica_id), json!(shards));
    }

    let shards = state.metadata.all_shards()?;
    let schema = state.current_schema();

    Ok(Json(json!({
        "N": servers.len(),
        "schema": schema,
        "shards": shards,
        "servers": servers,
    })))
}

async fn add(
    State(state): State<RouterState>,
    Json(req): Json<AddRequest>,
) -> Result<Json<AddResponse>> {
    if req.servers.len() < req.n {
        return Err(Error::BadArgument(
            "<Error> Number of new servers (n) is greater than newly added instances".into(),
        ));
    }

    let admitted = admit_servers(&state, &req.servers).await?;
    let shard_ids = register_shards(&state, &req.new_shards).await?;

    if let Err(e) = state.peers.request_election(&shard_ids).await {
        tracing::warn!("primary election after add failed: {}", e);
    }

    Ok(Json(AddResponse {
        n: state.replica_ids().len(),
        message: added_servers_message(&admitted),
        status: "successful".to_string(),
    }))
}

async fn remove(
    State(state): State<RouterState>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>> {
    if req.servers.len() > req.n {
        return Err(Error::BadArgument(
            "<Error> Length of server list is more than removable instances".into(),
        ));
    }

    let mut removed: Vec<i64> = req.servers.iter().map(|s| parse_server_name(s)).collect();

    // Top up with uniformly random picks until `n` replicas are chosen
    let pool = state.replica_ids();
    while removed.len() < req.n {
        match choose_random_excluding(&pool, &removed) {
            Some(id) => removed.push(id),
            None => break,
        }
    }

    let mut primary_shards = Vec::new();
    for &replica_id in &removed {
        let placements = state.metadata.placements_for_replica(replica_id)?;

        for (shard_id, is_primary) in &placements {
            if let Ok(handle) = state.shard_handle(shard_id) {
                handle.ring.lock().await.remove_replica(replica_id);
            }
            if *is_primary {
                primary_shards.push(shard_id.clone());
            }
        }

        state.metadata.remove_replica(replica_id)?;

        if let Err(e) = state.deployer.stop_replica(replica_id).await {
            tracing::warn!("stopping {} failed: {}", server_name(replica_id), e);
        }
    }

    {
        let mut replicas = state.replicas.write().unwrap();
        replicas.retain(|id| !removed.contains(id));
    }

    if !primary_shards.is_empty() {
        if let Err(e) = state.peers.request_election(&primary_shards).await {
            tracing::warn!("primary election after rm failed: {}", e);
        }
    }

    Ok(Json(RemoveResponse {
        message: RemoveSummary {
            n: state.replica_ids().len(),
            servers: removed.iter().map(|id| server_name(*id)).collect(),
        },
        status: "successful".to_string(),
    }))
}

// === Data plane ===

/// Reads are served by any one replica of each overlapping shard, so a
/// read racing a write may miss it; no attempt is made to route reads
/// to the primary.
async fn read(
    State(state): State<RouterState>,
    Json(req): Json<ReadRequest>,
) -> Result<Json<ReadResponse>> {
    let shards_queried = state
        .metadata
        .shards_overlapping(req.stud_id.low, req.stud_id.high)?;

    let mut data = Vec::new();
    for shard_id in &shards_queried {
        let handle = state.shard_handle(shard_id)?;
        let replica_id = handle
            .ring
            .lock()
            .await
            .get(mint_replica_id())
            .ok_or_else(|| {
                Error::Unreachable(format!("no replica available for shard {}", shard_id))
            })?;

        let rows = state
            .peers
            .read_shard(replica_id, shard_id, req.stud_id)
            .await?;
        data.extend(rows);
    }

    Ok(Json(ReadResponse {
        shards_queried,
        data,
        status: "success".to_string(),
    }))
}

async fn write(
    State(state): State<RouterState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<MessageResponse>> {
    let batches = state.partition_by_shard(&req.data)?;

    for (shard_id, records) in &batches {
        let handle = state.shard_handle(shard_id)?;
        // Held across the primary call: one mutation per shard at a time
        let _guard = handle.ring.lock().await;

        let primary = state
            .metadata
            .primary_for_shard(shard_id)?
            .ok_or_else(|| {
                Error::Internal(format!("no primary elected for shard {}", shard_id))
            })?;

        state.peers.write_shard(primary, shard_id, records).await?;
        state
            .metadata
            .bump_valid_idx(shard_id, records.len() as i64)?;
    }

    Ok(Json(MessageResponse::success(format!(
        "{} Data entries added",
        req.data.len()
    ))))
}

async fn update(
    State(state): State<RouterState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<MessageResponse>> {
    let shard_id = resolve_shard(&state, req.stud_id)?;
    let handle = state.shard_handle(&shard_id)?;
    let _guard = handle.ring.lock().await;

    let primary = state
        .metadata
        .primary_for_shard(&shard_id)?
        .ok_or_else(|| Error::Internal(format!("no primary elected for shard {}", shard_id)))?;

    state
        .peers
        .update_shard(primary, &shard_id, req.stud_id, &req.data)
        .await?;

    Ok(Json(MessageResponse::success(format!(
        "Data entry for Stud_id: {} updated",
        req.stud_id
    ))))
}

async fn delete(
    State(state): State<RouterState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<MessageResponse>> {
    let shard_id = resolve_shard(&state, req.stud_id)?;
    let handle = state.shard_handle(&shard_id)?;
    let _guard = handle.ring.lock().await;

    let primary = state
        .metadata
        .primary_for_shard(&shard_id)?
        .ok_or_else(|| Error::Internal(format!("no primary elected for shard {}", shard_id)))?;

    state
        .peers
        .delete_from_shard(primary, &shard_id, req.stud_id)
        .await?;

    Ok(Json(MessageResponse::success(format!(
        "Data entry with Stud_id: {} removed from all replicas",
        req.stud_id
    ))))
}

fn resolve_shard(state: &RouterState, stud_id: i64) -> Result<String> {
    state
        .metadata
        .shard_for_id(stud_id)?
        .ok_or_else(|| Error::NotFound(format!("no shard covers Stud_id {}", stud_id)))
}

// === Control hooks ===

async fn serverids(State(state): State<RouterState>) -> Json<Vec<i64>> {
    Json(state.replica_ids())
}

async fn replace_server(
    State(state): State<RouterState>,
    Json(req): Json<ReplaceServerRequest>,
) -> Result<StatusCode> {
    replace::replace_server(&state, req.down_server_id, req.new_server_id).await?;
    Ok(StatusCode::OK)
}

/// Creates the router's HTTP surface.
pub fn create_router(state: RouterState) -> Router {
    Router::new()
        .route("/init", axum::routing::post(init))
        .route("/status", axum::routing::get(status))
        .route("/add", axum::routing::post(add))
        .route("/rm", axum::routing::delete(remove))
        .route("/read", axum::routing::post(read))
        .route("/write", axum::routing::post(write))
        .route("/update", axum::routing::put(update))
        .route("/del", axum::routing::delete(delete))
        .route("/serverids", axum::routing::get(serverids))
        .route("/replace_server", axum::routing::post(replace_server))
        .with_state(state)
}
