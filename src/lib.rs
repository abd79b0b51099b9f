//! # stratakv
//!
//! A sharded, replicated key-value store for a single logical table of
//! student records, with:
//! - A stateless router fronting all admin and data traffic
//! - Write-ahead logging (WAL) on every replica for durability
//! - Heartbeat-driven failure detection and replica replacement
//! - Primary election by WAL length
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Router                   │
//! │  (admin + data plane, per-shard mutex,   │
//! │   consistent-hash replica selection)     │
//! └───────────┬──────────────────┬───────────┘
//!             │ HTTP             │ HTTP
//!   ┌─────────┴────────┐   ┌─────┴────────────┐
//!   │    Controller    │   │  Replica agents  │
//!   │ (heartbeats,     │   │  Server{id}      │
//!   │  replacement,    │   │   + shard store  │
//!   │  primary elect)  │   │   + WAL          │
//!   └──────────────────┘   └──────────────────┘
//! ```
//!
//! Writes flow client → router → primary replica → secondaries; the
//! primary appends to its WAL and requires an acknowledgment from every
//! secondary before committing locally. The shared metadata ledger
//! (ShardT/MapT) is the authoritative record of shard ranges and
//! replica placement; the router's in-memory hash rings are caches
//! rebuilt at admin transitions.
//!
//! ## Usage
//!
//! ### Start the router
//! ```bash
//! stratakv-router --bind 0.0.0.0:5000 \
//!   --metadata ./metadata.db \
//!   --controller http://localhost:8000
//! ```
//!
//! ### Start the controller
//! ```bash
//! stratakv-controller --bind 0.0.0.0:8000 \
//!   --metadata ./metadata.db \
//!   --router http://localhost:5000
//! ```
//!
//! ### Start a replica agent (normally spawned by the router)
//! ```bash
//! id=100042 stratakv-replica --bind 0.0.0.0:3000 \
//!   --data ./replica-data \
//!   --controller http://localhost:8000
//! ```

pub mod common;
pub mod controller;
pub mod metadata;
pub mod replica;
pub mod router;

// Re-export commonly used types
pub use common::{Error, Result};
pub use controller::Controller;
pub use metadata::MetadataStore;
pub use replica::ReplicaServer;
pub use router::RouterServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
