//! HTTP surface of the replica agent
//!
//! Serves heartbeat, config, copy, read, and the replicated mutation
//! routes. Every mutation follows the same path: resolve the shard's
//! placement from the controller, append to the WAL, fan out to the
//! secondaries when this replica is the shard's primary, then commit
//! locally.

use crate::common::types::{
    AgentDeleteRequest, AgentReadRequest, AgentReadResponse, AgentUpdateRequest,
    AgentWriteRequest, ConfigPayload, CopyRequest, MessageResponse, Record, ShardServersRequest,
    ShardServersResponse, WalRecord,
};
use crate::common::utils::{server_name, timestamp_now_millis};
use crate::common::{Error, Result};
use crate::replica::store::ShardStore;
use crate::replica::wal::Wal;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Shared agent state for HTTP handlers.
#[derive(Clone)]
pub struct AgentState {
    pub replica_id: i64,
    pub store: Arc<ShardStore>,
    pub wal: Arc<Wal>,
    pub controller_url: String,
    pub replica_port: u16,
    pub client: reqwest::Client,
}

/// A mutation that runs through the WAL-then-replicate-then-commit path.
enum Mutation {
    Write(AgentWriteRequest),
    Update(AgentUpdateRequest),
    Delete(AgentDeleteRequest),
}

impl Mutation {
    fn shard(&self) -> &str {
        match self {
            Mutation::Write(req) => &req.shard,
            Mutation::Update(req) => &req.shard,
            Mutation::Delete(req) => &req.shard,
        }
    }

    fn stud_id(&self) -> i64 {
        match self {
            Mutation::Write(_) => 0,
            Mutation::Update(req) => req.stud_id,
            Mutation::Delete(req) => req.stud_id,
        }
    }

    fn wal_data(&self) -> Vec<Record> {
        match self {
            Mutation::Write(req) => req.data.clone(),
            Mutation::Update(req) => vec![req.data.clone()],
            Mutation::Delete(_) => vec![],
        }
    }

    fn method(&self) -> reqwest::Method {
        match self {
            Mutation::Write(_) => reqwest::Method::POST,
            Mutation::Update(_) => reqwest::Method::PUT,
            Mutation::Delete(_) => reqwest::Method::DELETE,
        }
    }

    fn route(&self) -> &'static str {
        match self {
            Mutation::Write(_) => "/write",
            Mutation::Update(_) => "/update",
            Mutation::Delete(_) => "/delete",
        }
    }

    fn body(&self) -> Result<serde_json::Value> {
        let value = match self {
            Mutation::Write(req) => serde_json::to_value(req)?,
            Mutation::Update(req) => serde_json::to_value(req)?,
            Mutation::Delete(req) => serde_json::to_value(req)?,
        };
        Ok(value)
    }

    fn apply(&self, store: &ShardStore) -> Result<()> {
        match self {
            Mutation::Write(req) => store.insert_records(&req.shard, &req.data),
            Mutation::Update(req) => store.update_record(&req.shard, req.stud_id, &req.data),
            Mutation::Delete(req) => store.delete_record(&req.shard, req.stud_id),
        }
    }

    fn success_message(&self) -> String {
        match self {
            Mutation::Write(_) => "Data entries added".to_string(),
            Mutation::Update(req) => format!("Data entry for Stud_id:{} updated", req.stud_id),
            Mutation::Delete(req) => format!("Data entry with Stud_id:{} removed", req.stud_id),
        }
    }
}

impl AgentState {
    /// Current placements for a shard, from the controller.
    async fn shard_servers(&self, shard: &str) -> Result<ShardServersResponse> {
        let url = format!("{}/shard_servers", self.controller_url);
        let resp = self
            .client
            .get(&url)
            .json(&ShardServersRequest {
                shard_id: shard.to_string(),
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Unreachable(format!(
                "controller returned {} for shard {}",
                resp.status(),
                shard
            )));
        }
        Ok(resp.json().await?)
    }

    /// Replay the mutation on every secondary with its original verb and
    /// route; each secondary must acknowledge with a 2xx.
    async fn replicate_to_secondaries(
        &self,
        mutation: &Mutation,
        secondaries: &[i64],
    ) -> Result<Vec<bool>> {
        let body = mutation.body()?;
        let mut acks = Vec::with_capacity(secondaries.len());
        for &secondary in secondaries {
            let url = format!(
                "http://{}:{}{}",
                server_name(secondary),
                self.replica_port,
                mutation.route()
            );
            let ack = match self
                .client
                .request(mutation.method(), &url)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    tracing::warn!("replication to {} failed: {}", server_name(secondary), e);
                    false
                }
            };
            acks.push(ack);
        }
        Ok(acks)
    }
}

/// The acknowledgment policy: every secondary must have acked.
fn received_quorum(acks: &[bool]) -> bool {
    acks.iter().all(|ack| *ack)
}

/// The write path shared by write, update, and delete.
async fn replicated_mutation(state: &AgentState, mutation: Mutation) -> Result<MessageResponse> {
    let placements = state.shard_servers(mutation.shard()).await?;

    state.wal.append(&WalRecord {
        timestamp: timestamp_now_millis(),
        shard: mutation.shard().to_string(),
        data: mutation.wal_data(),
        stud_id: mutation.stud_id(),
    })?;

    if placements.primary == state.replica_id {
        let secondaries: Vec<i64> = placements
            .server_ids
            .iter()
            .copied()
            .filter(|id| *id != placements.primary)
            .collect();

        let acks = state.replicate_to_secondaries(&mutation, &secondaries).await?;
        if !received_quorum(&acks) {
            return Err(Error::ReplicationQuorum);
        }
    }

    mutation.apply(&state.store)?;

    Ok(MessageResponse::success(mutation.success_message()))
}

// === Handlers ===

async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

async fn config(
    State(state): State<AgentState>,
    Json(req): Json<ConfigPayload>,
) -> Result<Json<MessageResponse>> {
    state.store.configure(&req.schema, &req.shards)?;

    let name = server_name(state.replica_id);
    let parts: Vec<String> = req
        .shards
        .iter()
        .map(|shard| format!("{}:{}", name, shard))
        .collect();
    let message = format!("{} configured", parts.join(", "));

    tracing::info!("configured shards: {:?}", req.shards);
    Ok(Json(MessageResponse::success(message)))
}

async fn copy(
    State(state): State<AgentState>,
    Json(req): Json<CopyRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut resp = serde_json::Map::new();
    for shard in &req.shards {
        let rows = state.store.dump(shard)?;
        resp.insert(shard.clone(), serde_json::to_value(rows)?);
    }
    resp.insert("status".to_string(), json!("success"));
    Ok(Json(serde_json::Value::Object(resp)))
}

async fn read(
    State(state): State<AgentState>,
    Json(req): Json<AgentReadRequest>,
) -> Result<Json<AgentReadResponse>> {
    let data = state
        .store
        .read_range(&req.shard, req.stud_id.low, req.stud_id.high)?;
    Ok(Json(AgentReadResponse {
        data,
        status: "success".to_string(),
    }))
}

async fn write(
    State(state): State<AgentState>,
    Json(req): Json<AgentWriteRequest>,
) -> Result<Json<MessageResponse>> {
    let resp = replicated_mutation(&state, Mutation::Write(req)).await?;
    Ok(Json(resp))
}

async fn update(
    State(state): State<AgentState>,
    Json(req): Json<AgentUpdateRequest>,
) -> Result<Json<MessageResponse>> {
    let resp = replicated_mutation(&state, Mutation::Update(req)).await?;
    Ok(Json(resp))
}

async fn delete(
    State(state): State<AgentState>,
    Json(req): Json<AgentDeleteRequest>,
) -> Result<Json<MessageResponse>> {
    let resp = replicated_mutation(&state, Mutation::Delete(req)).await?;
    Ok(Json(resp))
}

async fn wal_length(State(state): State<AgentState>) -> Result<impl IntoResponse> {
    let length = state.wal.length()?;
    Ok(Json(length as i64))
}

/// Creates the agent HTTP router.
pub fn create_router(state: AgentState) -> Router {
    Router::new()
        .route("/heartbeat", axum::routing::get(heartbeat))
        .route("/config", axum::routing::post(config))
        .route("/copy", axum::routing::get(copy))
        .route("/read", axum::routing::post(read))
        .route("/write", axum::routing::post(write))
        .route("/update", axum::routing::put(update))
        .route("/delete", axum::routing::delete(delete))
        .route("/wal_length", axum::routing::get(wal_length))
        .with_state(state)
}
