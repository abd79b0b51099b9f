//! Controller implementation
//!
//! The control plane is responsible for:
//! - Failure detection via per-replica heartbeat monitors
//! - Driving replica replacement through the router
//! - Primary election by WAL length
//! - Serving shard placement lookups to replica agents

pub mod election;
pub mod http;
pub mod monitor;
pub mod server;

pub use server::Controller;
