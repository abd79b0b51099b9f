//! Primary election by WAL length
//!
//! For each shard, every placed replica reports its WAL length and the
//! longest log wins. This is a recovery heuristic, not a consensus
//! protocol: a replica that is merely network-partitioned keeps its
//! primary flag in its own view and can produce split-brain when it
//! recovers. Unreachable replicas are skipped; if nobody answers, the
//! shard's primary is left untouched.

use crate::common::utils::server_name;
use crate::common::Result;
use crate::metadata::MetadataStore;

/// Longest WAL wins; on a tie the last replica examined wins, which is
/// deterministic for a fixed placement query order.
pub fn pick_winner(wal_lengths: &[(i64, i64)]) -> Option<i64> {
    let mut winner = None;
    let mut best = i64::MIN;
    for &(replica_id, length) in wal_lengths {
        if length >= best {
            best = length;
            winner = Some(replica_id);
        }
    }
    winner
}

/// Fetch one replica's WAL length.
async fn wal_length(client: &reqwest::Client, replica_id: i64, port: u16) -> Result<i64> {
    let url = format!("http://{}:{}/wal_length", server_name(replica_id), port);
    let resp = client.get(&url).send().await?;
    Ok(resp.json::<i64>().await?)
}

/// Elect a primary for each listed shard and persist the results.
/// Individual failures log and continue; the election never fails the
/// caller.
pub async fn elect_primaries(
    metadata: &MetadataStore,
    client: &reqwest::Client,
    replica_port: u16,
    shard_ids: &[String],
) {
    for shard_id in shard_ids {
        let replicas = match metadata.replicas_for_shard(shard_id) {
            Ok(replicas) => replicas,
            Err(e) => {
                tracing::error!("election: reading placements for {}: {}", shard_id, e);
                continue;
            }
        };

        let mut lengths = Vec::with_capacity(replicas.len());
        for replica_id in replicas {
            match wal_length(client, replica_id, replica_port).await {
                Ok(length) => lengths.push((replica_id, length)),
                Err(e) => {
                    tracing::warn!(
                        "election: {} unreachable for {}: {}",
                        server_name(replica_id),
                        shard_id,
                        e
                    );
                }
            }
        }

        let Some(winner) = pick_winner(&lengths) else {
            tracing::warn!("election: no replica of {} answered, keeping primary", shard_id);
            continue;
        };

        match metadata.set_primary(shard_id, winner) {
            Ok(()) => {
                tracing::info!("elected {} as primary of {}", server_name(winner), shard_id)
            }
            Err(e) => tracing::error!("election: persisting primary for {}: {}", shard_id, e),
        }
    }
}
