//! Configuration for stratakv components

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Bind address for the client-facing HTTP API
    pub bind_addr: SocketAddr,

    /// Path to the shared metadata ledger (SQLite)
    pub metadata_path: PathBuf,

    /// Controller base URL
    pub controller_url: String,

    /// Port replica agents listen on
    #[serde(default = "default_replica_port")]
    pub replica_port: u16,

    /// Docker image used to spawn replica agents
    #[serde(default = "default_replica_image")]
    pub replica_image: String,

    /// Docker network replicas are attached to
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_replica_port() -> u16 {
    3000
}
fn default_replica_image() -> String {
    "stratakv-replica".to_string()
}
fn default_network() -> String {
    "stratakv-network".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".parse().unwrap(),
            metadata_path: PathBuf::from("./metadata.db"),
            controller_url: "http://localhost:8000".to_string(),
            replica_port: default_replica_port(),
            replica_image: default_replica_image(),
            network: default_network(),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Bind address for the control-plane HTTP API
    pub bind_addr: SocketAddr,

    /// Path to the shared metadata ledger (SQLite)
    pub metadata_path: PathBuf,

    /// Router base URL
    pub router_url: String,

    /// Port replica agents listen on
    #[serde(default = "default_replica_port")]
    pub replica_port: u16,

    /// Seconds between heartbeat polls per replica
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    5
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".parse().unwrap(),
            metadata_path: PathBuf::from("./metadata.db"),
            router_url: "http://localhost:5000".to_string(),
            replica_port: default_replica_port(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

/// Replica agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Numeric replica id (from the `id` environment variable)
    pub replica_id: i64,

    /// Bind address for the agent HTTP API
    pub bind_addr: SocketAddr,

    /// Path to the local shard store (SQLite)
    pub db_path: PathBuf,

    /// Directory holding the WAL file
    pub wal_dir: PathBuf,

    /// Controller base URL
    pub controller_url: String,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            replica_id: 0,
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
            db_path: PathBuf::from("./shards.db"),
            wal_dir: PathBuf::from("./wal"),
            controller_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Runtime tuning shared by outbound HTTP clients
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Request timeout
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Retry attempts for control-plane calls
    pub max_retries: usize,

    /// Delay between retries
    pub retry_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl RouterConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.controller_url.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "controller_url is required".into(),
            ));
        }
        Ok(())
    }
}

impl ControllerConfig {
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.router_url.is_empty() {
            return Err(crate::Error::InvalidConfig("router_url is required".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(crate::Error::InvalidConfig(
                "heartbeat_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl ReplicaConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.replica_id <= 0 {
            return Err(crate::Error::InvalidConfig(
                "replica_id is required (set the `id` environment variable)".into(),
            ));
        }
        if self.controller_url.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "controller_url is required".into(),
            ));
        }
        Ok(())
    }
}
