//! Outbound HTTP client for replica agents and the controller

use crate::common::types::{
    AgentDeleteRequest, AgentReadRequest, AgentReadResponse, AgentUpdateRequest,
    AgentWriteRequest, ConfigPayload, CopyRequest, IdRange, MessageResponse, PrimaryElectRequest,
    Record, Schema,
};
use crate::common::utils::server_name;
use crate::common::{Error, Result, RuntimeConfig};

#[derive(Clone)]
pub struct PeerClient {
    client: reqwest::Client,
    replica_port: u16,
    controller_url: String,
}

impl PeerClient {
    pub fn new(replica_port: u16, controller_url: String) -> Result<Self> {
        let runtime = RuntimeConfig::default();
        let client = reqwest::Client::builder()
            .connect_timeout(runtime.connect_timeout)
            .timeout(runtime.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            replica_port,
            controller_url,
        })
    }

    fn replica_url(&self, replica_id: i64, route: &str) -> String {
        format!(
            "http://{}:{}{}",
            server_name(replica_id),
            self.replica_port,
            route
        )
    }

    fn check(status: reqwest::StatusCode, context: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Unreachable(format!("{} returned {}", context, status)))
        }
    }

    /// Like `check`, but surfaces the peer's own failure message (e.g. a
    /// primary's quorum failure) to our caller when the body carries one.
    async fn expect_success(resp: reqwest::Response, context: &str) -> Result<()> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let fallback = format!("{} returned {}", context, status);
        let message = resp
            .json::<MessageResponse>()
            .await
            .map(|body| body.message)
            .unwrap_or(fallback);
        Err(Error::Unreachable(message))
    }

    // === Replica agent calls ===

    pub async fn configure_replica(
        &self,
        replica_id: i64,
        schema: &Schema,
        shards: &[String],
    ) -> Result<()> {
        let resp = self
            .client
            .post(self.replica_url(replica_id, "/config"))
            .json(&ConfigPayload {
                schema: schema.clone(),
                shards: shards.to_vec(),
            })
            .send()
            .await?;
        Self::check(resp.status(), &format!("config on {}", server_name(replica_id)))
    }

    /// Full row set of one shard from a surviving replica.
    pub async fn copy_shard(&self, replica_id: i64, shard: &str) -> Result<Vec<Record>> {
        let resp = self
            .client
            .get(self.replica_url(replica_id, "/copy"))
            .json(&CopyRequest {
                shards: vec![shard.to_string()],
            })
            .send()
            .await?;
        Self::check(resp.status(), &format!("copy from {}", server_name(replica_id)))?;

        let mut body: serde_json::Value = resp.json().await?;
        let rows = body
            .get_mut(shard)
            .map(serde_json::Value::take)
            .ok_or_else(|| {
                Error::Internal(format!(
                    "copy response from {} missing shard {}",
                    server_name(replica_id),
                    shard
                ))
            })?;
        Ok(serde_json::from_value(rows)?)
    }

    pub async fn read_shard(
        &self,
        replica_id: i64,
        shard: &str,
        range: IdRange,
    ) -> Result<Vec<Record>> {
        let resp = self
            .client
            .post(self.replica_url(replica_id, "/read"))
            .json(&AgentReadRequest {
                shard: shard.to_string(),
                stud_id: range,
            })
            .send()
            .await?;
        Self::check(resp.status(), &format!("read from {}", server_name(replica_id)))?;
        let body: AgentReadResponse = resp.json().await?;
        Ok(body.data)
    }

    pub async fn write_shard(
        &self,
        replica_id: i64,
        shard: &str,
        records: &[Record],
    ) -> Result<()> {
        let resp = self
            .client
            .post(self.replica_url(replica_id, "/write"))
            .json(&AgentWriteRequest {
                shard: shard.to_string(),
                data: records.to_vec(),
            })
            .send()
            .await?;
        Self::expect_success(resp, &format!("write to {}", server_name(replica_id))).await
    }

    pub async fn update_shard(
        &self,
        replica_id: i64,
        shard: &str,
        stud_id: i64,
        record: &Record,
    ) -> Result<()> {
        let resp = self
            .client
            .put(self.replica_url(replica_id, "/update"))
            .json(&AgentUpdateRequest {
                shard: shard.to_string(),
                stud_id,
                data: record.clone(),
            })
            .send()
            .await?;
        Self::expect_success(resp, &format!("update on {}", server_name(replica_id))).await
    }

    pub async fn delete_from_shard(
        &self,
        replica_id: i64,
        shard: &str,
        stud_id: i64,
    ) -> Result<()> {
        let resp = self
            .client
            .delete(self.replica_url(replica_id, "/delete"))
            .json(&AgentDeleteRequest {
                shard: shard.to_string(),
                stud_id,
            })
            .send()
            .await?;
        Self::expect_success(resp, &format!("delete on {}", server_name(replica_id))).await
    }

    // === Controller calls ===

    /// Register a replica with the controller's failure detector. Body
    /// is the bare numeric id.
    pub async fn register_heartbeat(&self, replica_id: i64) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/check_heartbeat", self.controller_url))
            .json(&replica_id)
            .send()
            .await?;
        Self::check(resp.status(), "check_heartbeat on controller")
    }

    pub async fn request_election(&self, shard_ids: &[String]) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/primary_elect", self.controller_url))
            .json(&PrimaryElectRequest {
                shard_ids: shard_ids.to_vec(),
            })
            .send()
            .await?;
        Self::check(resp.status(), "primary_elect on controller")
    }
}
