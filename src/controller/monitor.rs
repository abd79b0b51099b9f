//! Heartbeat monitors and the replacement loop
//!
//! One long-running monitor task per replica polls `/heartbeat` on a
//! fixed interval. Failures funnel into a single mpsc channel that the
//! replacement loop drains: it mints a fresh replica id, asks the
//! router to perform the replacement, and starts monitoring the
//! newcomer.

use crate::common::types::ReplaceServerRequest;
use crate::common::utils::{mint_replica_id, server_name};
use crate::controller::http::ControllerState;
use std::time::Duration;
use tokio::sync::mpsc;

/// Replica ids the router currently knows about.
async fn router_replica_ids(state: &ControllerState) -> Option<Vec<i64>> {
    let url = format!("{}/serverids", state.config.router_url);
    let resp = state.client.get(&url).send().await.ok()?;
    resp.json::<Vec<i64>>().await.ok()
}

/// One poll: true when the replica answered 200.
async fn heartbeat_ok(state: &ControllerState, replica_id: i64) -> bool {
    let url = format!(
        "http://{}:{}/heartbeat",
        server_name(replica_id),
        state.config.replica_port
    );
    match state.client.get(&url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// Spawn the monitor task for one replica. The task exits silently when
/// the replica leaves the membership list, and exits after publishing a
/// DOWN event when a heartbeat fails.
pub fn spawn_monitor(state: ControllerState, replica_id: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(state.config.heartbeat_interval_secs);
        loop {
            // Membership refresh: a removed replica is not a failure.
            if let Some(members) = router_replica_ids(&state).await {
                if !members.contains(&replica_id) {
                    tracing::debug!("{} left the cluster, monitor exiting", server_name(replica_id));
                    return;
                }
            }

            if !heartbeat_ok(&state, replica_id).await {
                tracing::warn!("{} is down!", server_name(replica_id));
                let _ = state.down_tx.send(replica_id).await;
                return;
            }

            tokio::time::sleep(interval).await;
        }
    });
}

/// Drain DOWN events: replace the failed replica via the router, then
/// begin heartbeating the replacement. Errors log and continue; the
/// monitor will re-report the replica if it is still down.
pub async fn run_replacement_loop(state: ControllerState, mut down_rx: mpsc::Receiver<i64>) {
    while let Some(down_id) = down_rx.recv().await {
        let new_id = mint_replica_id();
        tracing::info!(
            "replacing {} with {}",
            server_name(down_id),
            server_name(new_id)
        );

        let url = format!("{}/replace_server", state.config.router_url);
        let result = state
            .client
            .post(&url)
            .json(&ReplaceServerRequest {
                down_server_id: down_id,
                new_server_id: new_id,
            })
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                spawn_monitor(state.clone(), new_id);
            }
            Ok(resp) => {
                tracing::error!(
                    "replace_server for {} returned {}",
                    server_name(down_id),
                    resp.status()
                );
            }
            Err(e) => {
                tracing::error!("replace_server for {} failed: {}", server_name(down_id), e);
            }
        }
    }
}
