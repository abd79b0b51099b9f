//! Wire types shared by the router, controller, and replica agents
//!
//! Field names are part of the public API and must serialize exactly as
//! written here (`Stud_id`, `Shard_id`, ...); serde renames carry the
//! casing the clients expect.

use serde::{Deserialize, Serialize};

/// One record of the logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
    #[serde(rename = "Stud_name")]
    pub stud_name: String,
    #[serde(rename = "Stud_marks")]
    pub stud_marks: i64,
}

/// Column layout of the logical table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<String>,
    pub dtypes: Vec<String>,
}

impl Schema {
    /// The canonical student-record schema.
    pub fn student() -> Self {
        Self {
            columns: vec![
                "Stud_id".to_string(),
                "Stud_name".to_string(),
                "Stud_marks".to_string(),
            ],
            dtypes: vec![
                "Number".to_string(),
                "String".to_string(),
                "Number".to_string(),
            ],
        }
    }
}

/// A shard definition as supplied by admin requests and reported by
/// `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    #[serde(rename = "Stud_id_low")]
    pub stud_id_low: i64,
    #[serde(rename = "Shard_id")]
    pub shard_id: String,
    #[serde(rename = "Shard_size")]
    pub shard_size: i64,
}

/// Inclusive id range used by read requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub low: i64,
    pub high: i64,
}

// === Router surface ===

#[derive(Debug, Clone, Deserialize)]
pub struct InitRequest {
    #[serde(rename = "N")]
    pub n: usize,
    pub schema: Schema,
    pub shards: Vec<ShardSpec>,
    /// Server name → shard ids hosted there
    pub servers: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddRequest {
    pub n: usize,
    pub new_shards: Vec<ShardSpec>,
    pub servers: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddResponse {
    #[serde(rename = "N")]
    pub n: usize,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRequest {
    pub n: usize,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveSummary {
    #[serde(rename = "N")]
    pub n: usize,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    pub message: RemoveSummary,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadRequest {
    #[serde(rename = "Stud_id")]
    pub stud_id: IdRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadResponse {
    pub shards_queried: Vec<String>,
    pub data: Vec<Record>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    pub data: Vec<Record>,
}

/// Generic `{message, status}` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    pub status: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: "success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
    pub data: Record,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceServerRequest {
    pub down_server_id: i64,
    pub new_server_id: i64,
}

// === Replica agent surface ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPayload {
    pub schema: Schema,
    pub shards: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    pub shards: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReadRequest {
    pub shard: String,
    #[serde(rename = "Stud_id")]
    pub stud_id: IdRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReadResponse {
    pub data: Vec<Record>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWriteRequest {
    pub shard: String,
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdateRequest {
    pub shard: String,
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
    pub data: Record,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDeleteRequest {
    pub shard: String,
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
}

/// One WAL line: appended before any shard-store mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    pub timestamp: u64,
    pub shard: String,
    pub data: Vec<Record>,
    #[serde(rename = "Stud_id")]
    pub stud_id: i64,
}

// === Controller surface ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardServersRequest {
    pub shard_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardServersResponse {
    pub server_ids: Vec<i64>,
    /// `-1` until a primary has been elected for the shard.
    pub primary: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryElectRequest {
    pub shard_ids: Vec<String>,
}
