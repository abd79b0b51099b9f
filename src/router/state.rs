//! Shared router state
//!
//! The metadata ledger is authoritative; the per-shard hash rings held
//! here are caches rebuilt from placement rows at admin transitions.
//! Each ring lives behind its own `tokio::sync::Mutex` — that mutex is
//! the per-shard write lock and is held across the whole replication
//! fan-out of a mutation, so at most one mutation per shard is in
//! flight from the router at any time. Reads never take it for longer
//! than a ring lookup.

use crate::common::types::{Record, Schema};
use crate::common::{Error, HashRing, Result, RouterConfig};
use crate::metadata::MetadataStore;
use crate::router::deploy::Deployer;
use crate::router::peers::PeerClient;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// One shard's ring plus the mutex that serializes its mutations.
pub struct ShardHandle {
    pub ring: Mutex<HashRing>,
}

#[derive(Clone)]
pub struct RouterState {
    pub metadata: Arc<MetadataStore>,
    pub rings: Arc<RwLock<HashMap<String, Arc<ShardHandle>>>>,
    pub replicas: Arc<RwLock<Vec<i64>>>,
    pub schema: Arc<RwLock<Option<Schema>>>,
    pub peers: PeerClient,
    pub deployer: Arc<dyn Deployer>,
    pub config: RouterConfig,
}

impl RouterState {
    pub fn new(
        metadata: Arc<MetadataStore>,
        peers: PeerClient,
        deployer: Arc<dyn Deployer>,
        config: RouterConfig,
    ) -> Self {
        Self {
            metadata,
            rings: Arc::new(RwLock::new(HashMap::new())),
            replicas: Arc::new(RwLock::new(Vec::new())),
            schema: Arc::new(RwLock::new(None)),
            peers,
            deployer,
            config,
        }
    }

    /// Rebuild caches from the ledger, e.g. after a router restart.
    pub async fn hydrate(&self) -> Result<()> {
        let shards = self.metadata.all_shards()?;
        for spec in &shards {
            self.rebuild_ring(&spec.shard_id).await?;
        }
        *self.replicas.write().unwrap() = self.metadata.all_replicas()?;
        if !shards.is_empty() {
            *self.schema.write().unwrap() = Some(Schema::student());
        }
        Ok(())
    }

    pub fn shard_handle(&self, shard_id: &str) -> Result<Arc<ShardHandle>> {
        self.rings
            .read()
            .unwrap()
            .get(shard_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(shard_id.to_string()))
    }

    /// Rebuild one shard's ring from its placement rows; creates the
    /// handle on first sight of the shard.
    pub async fn rebuild_ring(&self, shard_id: &str) -> Result<Arc<ShardHandle>> {
        let members = self.metadata.replicas_for_shard(shard_id)?;
        let handle = {
            let mut rings = self.rings.write().unwrap();
            rings
                .entry(shard_id.to_string())
                .or_insert_with(|| {
                    Arc::new(ShardHandle {
                        ring: Mutex::new(HashRing::new()),
                    })
                })
                .clone()
        };
        let mut ring = handle.ring.lock().await;
        *ring = HashRing::from_members(members);
        drop(ring);
        Ok(handle)
    }

    /// Split a record batch by destination shard. Every record must land
    /// in a known shard.
    pub fn partition_by_shard(
        &self,
        records: &[Record],
    ) -> Result<HashMap<String, Vec<Record>>> {
        let mut batches: HashMap<String, Vec<Record>> = HashMap::new();
        for record in records {
            let shard = self
                .metadata
                .shard_for_id(record.stud_id)?
                .ok_or_else(|| {
                    Error::NotFound(format!("no shard covers Stud_id {}", record.stud_id))
                })?;
            batches.entry(shard).or_default().push(record.clone());
        }
        Ok(batches)
    }

    pub fn replica_ids(&self) -> Vec<i64> {
        self.replicas.read().unwrap().clone()
    }

    pub fn current_schema(&self) -> Schema {
        self.schema
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(Schema::student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ShardSpec;
    use crate::router::deploy::NoopDeployer;

    fn test_state() -> RouterState {
        let metadata = Arc::new(MetadataStore::open_in_memory().unwrap());
        let peers = PeerClient::new(3000, "http://localhost:8000".to_string()).unwrap();
        RouterState::new(
            metadata,
            peers,
            Arc::new(NoopDeployer),
            RouterConfig::default(),
        )
    }

    fn register_shard(state: &RouterState, low: i64, id: &str, size: i64) {
        state
            .metadata
            .insert_shard(&ShardSpec {
                stud_id_low: low,
                shard_id: id.to_string(),
                shard_size: size,
            })
            .unwrap();
    }

    fn record(id: i64) -> Record {
        Record {
            stud_id: id,
            stud_name: format!("s{}", id),
            stud_marks: 0,
        }
    }

    #[test]
    fn test_partition_by_shard() {
        let state = test_state();
        register_shard(&state, 0, "sh1", 100);
        register_shard(&state, 100, "sh2", 100);

        let batches = state
            .partition_by_shard(&[record(1), record(150), record(7)])
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches["sh1"].len(), 2);
        assert_eq!(batches["sh2"].len(), 1);
    }

    #[test]
    fn test_partition_empty_batch() {
        let state = test_state();
        register_shard(&state, 0, "sh1", 100);
        assert!(state.partition_by_shard(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_partition_unroutable_record() {
        let state = test_state();
        register_shard(&state, 0, "sh1", 100);
        let err = state.partition_by_shard(&[record(5000)]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rebuild_ring_mirrors_placements() {
        let state = test_state();
        register_shard(&state, 0, "sh1", 100);
        for id in [100001, 100002] {
            state.metadata.insert_placement("sh1", id).unwrap();
        }

        let handle = state.rebuild_ring("sh1").await.unwrap();
        assert_eq!(handle.ring.lock().await.members(), vec![100001, 100002]);

        // A second rebuild after a placement change refreshes the cache
        state.metadata.insert_placement("sh1", 100003).unwrap();
        let handle = state.rebuild_ring("sh1").await.unwrap();
        assert_eq!(
            handle.ring.lock().await.members(),
            vec![100001, 100002, 100003]
        );
    }

    #[test]
    fn test_shard_handle_unknown_shard() {
        let state = test_state();
        assert!(state.shard_handle("nope").is_err());
    }
}
