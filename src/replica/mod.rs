//! Replica agent implementation
//!
//! Each replica hosts a subset of shards with:
//! - Write-ahead log (WAL) appended and fsynced before every commit
//! - One SQLite table per shard
//! - Primary-led replication to the shard's secondaries
//! - Heartbeat and shard-copy endpoints for the control plane

pub mod http;
pub mod server;
pub mod store;
pub mod wal;

pub use server::ReplicaServer;
