//! Replica-replacement protocol
//!
//! Given a failed replica and a freshly minted id: spawn the newcomer,
//! configure it with the failed replica's shard set, then per shard
//! (under that shard's ring mutex) drop the failed replica from the
//! ring, clone the shard's rows from a surviving replica, seed the
//! newcomer, and re-admit it to the ring. Placement rows are rewritten
//! in one pass afterwards, which clears primary status everywhere; the
//! election requested at the end restores primaries for the shards the
//! failed replica led.
//!
//! A step that fails aborts the replacement for that shard only. No
//! atomic rollback of the ledger is attempted; the controller reissues
//! the replacement on the next heartbeat failure if the cluster is
//! still unhealthy.

use crate::common::utils::{mint_replica_id, server_name};
use crate::common::{Error, Result};
use crate::router::state::RouterState;

pub async fn replace_server(state: &RouterState, down_id: i64, new_id: i64) -> Result<()> {
    tracing::info!(
        "replacing {} with {}",
        server_name(down_id),
        server_name(new_id)
    );

    state.deployer.spawn_replica(new_id).await?;

    let shard_ids = state.metadata.shards_for_replica(down_id)?;
    let schema = state.current_schema();
    state
        .peers
        .configure_replica(new_id, &schema, &shard_ids)
        .await?;

    let mut reelect = Vec::new();
    for shard_id in &shard_ids {
        match clone_shard_onto(state, shard_id, down_id, new_id).await {
            Ok(was_primary) => {
                if was_primary {
                    reelect.push(shard_id.clone());
                }
            }
            Err(e) => {
                tracing::error!(
                    "replacement of {} for shard {} failed: {}",
                    server_name(down_id),
                    shard_id,
                    e
                );
            }
        }
    }

    // Rewrite every placement row of the failed replica in one pass;
    // this also clears its primary flags.
    state.metadata.reassign_replica(down_id, new_id)?;

    {
        let mut replicas = state.replicas.write().unwrap();
        replicas.retain(|id| *id != down_id);
        if !replicas.contains(&new_id) {
            replicas.push(new_id);
        }
    }

    if !reelect.is_empty() {
        state.peers.request_election(&reelect).await?;
    }

    Ok(())
}

/// One shard's recovery step, under the shard's ring mutex. Returns
/// whether the failed replica was the shard's primary.
async fn clone_shard_onto(
    state: &RouterState,
    shard_id: &str,
    down_id: i64,
    new_id: i64,
) -> Result<bool> {
    let handle = state.shard_handle(shard_id)?;
    let mut ring = handle.ring.lock().await;

    ring.remove_replica(down_id);

    let source = ring.get(mint_replica_id()).ok_or_else(|| {
        Error::Unreachable(format!("no surviving replica holds shard {}", shard_id))
    })?;

    let rows = state.peers.copy_shard(source, shard_id).await?;
    state.peers.write_shard(new_id, shard_id, &rows).await?;

    ring.add_replica(new_id);
    drop(ring);

    let was_primary = state
        .metadata
        .placements_for_replica(down_id)?
        .iter()
        .any(|(shard, is_primary)| shard == shard_id && *is_primary);
    Ok(was_primary)
}
