//! Common utilities and types shared across stratakv

pub mod config;
pub mod error;
pub mod ring;
pub mod types;
pub mod utils;

pub use config::{ControllerConfig, ReplicaConfig, RouterConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use ring::HashRing;
pub use types::{Record, Schema, ShardSpec};
pub use utils::{mint_replica_id, parse_server_name, server_name, timestamp_now_millis};
