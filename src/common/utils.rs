//! Utility functions for stratakv

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Replica ids live in this range; hostnames are `Server{id}`.
pub const REPLICA_ID_MIN: i64 = 100_000;
pub const REPLICA_ID_MAX: i64 = 999_999;

/// Mint a fresh replica id, uniform in [100000, 999999].
pub fn mint_replica_id() -> i64 {
    rand::thread_rng().gen_range(REPLICA_ID_MIN..=REPLICA_ID_MAX)
}

/// Hostname for a replica id.
pub fn server_name(replica_id: i64) -> String {
    format!("Server{}", replica_id)
}

/// Parse a client-supplied replica name of the form `Server<digits>`.
/// Non-parsable names yield a uniformly random id.
pub fn parse_server_name(raw: &str) -> i64 {
    raw.strip_prefix("Server")
        .and_then(|digits| digits.parse::<i64>().ok())
        .unwrap_or_else(mint_replica_id)
}

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Pick a uniformly random member of `pool` that is not in `excluded`,
/// or `None` when nothing remains.
pub fn choose_random_excluding(pool: &[i64], excluded: &[i64]) -> Option<i64> {
    let available: Vec<i64> = pool
        .iter()
        .copied()
        .filter(|id| !excluded.contains(id))
        .collect();
    if available.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..available.len());
    Some(available[index])
}
