//! Shared metadata ledger (ShardT / MapT)
//!
//! The authoritative record of shard ranges and replica placement,
//! stored in SQLite so the router and controller processes can share
//! one file. In-memory hash rings are caches of MapT; every admin
//! transition goes through this ledger first.
//!
//! Tables (bootstrapped by `/init`):
//! - `shardt(stud_id_low PK, shard_id, shard_size, valid_idx)`
//! - `mapt(shard_id, server_id, is_primary)`

use crate::common::types::ShardSpec;
use crate::common::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const BUSY_TIMEOUT_MS: u64 = 5_000;

pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    /// Open or create the ledger. WAL journal mode so the router and
    /// controller can read and write concurrently across processes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        // journal_mode returns the resulting mode as a row
        conn.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS shardt (
                 stud_id_low INTEGER PRIMARY KEY,
                 shard_id    TEXT NOT NULL,
                 shard_size  INTEGER NOT NULL,
                 valid_idx   INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS mapt (
                 shard_id   TEXT NOT NULL,
                 server_id  INTEGER NOT NULL,
                 is_primary INTEGER NOT NULL DEFAULT 0
             );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory ledger for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS shardt (
                 stud_id_low INTEGER PRIMARY KEY,
                 shard_id    TEXT NOT NULL,
                 shard_size  INTEGER NOT NULL,
                 valid_idx   INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS mapt (
                 shard_id   TEXT NOT NULL,
                 server_id  INTEGER NOT NULL,
                 is_primary INTEGER NOT NULL DEFAULT 0
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // === ShardT ===

    /// Register a shard. Re-registering an existing range is a no-op so
    /// a repeated `/init` leaves the ledger equivalent.
    pub fn insert_shard(&self, spec: &ShardSpec) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO shardt (stud_id_low, shard_id, shard_size, valid_idx)
             VALUES (?1, ?2, ?3, 0)",
            params![spec.stud_id_low, spec.shard_id, spec.shard_size],
        )?;
        Ok(())
    }

    /// Resolve the shard owning a record id, by range lookup on
    /// `id BETWEEN stud_id_low AND stud_id_low + shard_size`.
    pub fn shard_for_id(&self, stud_id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let shard = conn
            .query_row(
                "SELECT shard_id FROM shardt
                 WHERE ?1 BETWEEN stud_id_low AND stud_id_low + shard_size
                 ORDER BY stud_id_low DESC LIMIT 1",
                params![stud_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(shard)
    }

    /// Shards whose range endpoints fall inside `[low, high]`.
    pub fn shards_overlapping(&self, low: i64, high: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT shard_id FROM shardt
             WHERE (stud_id_low BETWEEN ?1 AND ?2)
                OR (stud_id_low + shard_size BETWEEN ?1 AND ?2)",
        )?;
        let rows = stmt.query_map(params![low, high], |row| row.get::<_, String>(0))?;
        let mut shards = Vec::new();
        for shard in rows {
            shards.push(shard?);
        }
        Ok(shards)
    }

    /// All registered shards, in range order.
    pub fn all_shards(&self) -> Result<Vec<ShardSpec>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT stud_id_low, shard_id, shard_size FROM shardt ORDER BY stud_id_low",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ShardSpec {
                stud_id_low: row.get(0)?,
                shard_id: row.get(1)?,
                shard_size: row.get(2)?,
            })
        })?;
        let mut shards = Vec::new();
        for shard in rows {
            shards.push(shard?);
        }
        Ok(shards)
    }

    /// Records ever written to the shard.
    pub fn valid_idx(&self, shard_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let idx = conn
            .query_row(
                "SELECT valid_idx FROM shardt WHERE shard_id = ?1",
                params![shard_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(idx.unwrap_or(0))
    }

    /// Advance the written-record count after a successful write.
    pub fn bump_valid_idx(&self, shard_id: &str, count: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE shardt SET valid_idx = valid_idx + ?1 WHERE shard_id = ?2",
            params![count, shard_id],
        )?;
        Ok(())
    }

    // === MapT ===

    pub fn insert_placement(&self, shard_id: &str, server_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO mapt (shard_id, server_id, is_primary) VALUES (?1, ?2, 0)",
            params![shard_id, server_id],
        )?;
        Ok(())
    }

    /// Replicas placed on a shard, in placement order.
    pub fn replicas_for_shard(&self, shard_id: &str) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT server_id FROM mapt WHERE shard_id = ?1")?;
        let rows = stmt.query_map(params![shard_id], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// Current primary for a shard, if one has been elected.
    pub fn primary_for_shard(&self, shard_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let primary = conn
            .query_row(
                "SELECT server_id FROM mapt WHERE shard_id = ?1 AND is_primary = 1 LIMIT 1",
                params![shard_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(primary)
    }

    /// Shards hosted by a replica.
    pub fn shards_for_replica(&self, server_id: i64) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT shard_id FROM mapt WHERE server_id = ?1")?;
        let rows = stmt.query_map(params![server_id], |row| row.get::<_, String>(0))?;
        let mut shards = Vec::new();
        for shard in rows {
            shards.push(shard?);
        }
        Ok(shards)
    }

    /// Shards hosted by a replica together with its primary flag.
    pub fn placements_for_replica(&self, server_id: i64) -> Result<Vec<(String, bool)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT shard_id, is_primary FROM mapt WHERE server_id = ?1")?;
        let rows = stmt.query_map(params![server_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
        })?;
        let mut placements = Vec::new();
        for placement in rows {
            placements.push(placement?);
        }
        Ok(placements)
    }

    /// Distinct replica ids present anywhere in the placement relation.
    pub fn all_replicas(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT server_id FROM mapt ORDER BY server_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    /// Erase every placement row for a removed replica.
    pub fn remove_replica(&self, server_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM mapt WHERE server_id = ?1", params![server_id])?;
        Ok(())
    }

    /// Replace every placement row of `down_id` with `new_id`, clearing
    /// primary status everywhere (replacement step 5 — the election that
    /// follows restores primaries for the affected shards).
    pub fn reassign_replica(&self, down_id: i64, new_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE mapt SET server_id = ?1, is_primary = 0 WHERE server_id = ?2",
            params![new_id, down_id],
        )?;
        Ok(())
    }

    /// Persist the election result: `is_primary` true on the winner,
    /// false on every other placement row of the shard.
    pub fn set_primary(&self, shard_id: &str, winner: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE mapt SET is_primary = (server_id = ?1) WHERE shard_id = ?2",
            params![winner, shard_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(low: i64, id: &str, size: i64) -> ShardSpec {
        ShardSpec {
            stud_id_low: low,
            shard_id: id.to_string(),
            shard_size: size,
        }
    }

    #[test]
    fn test_shard_for_id() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_shard(&spec(0, "sh1", 100)).unwrap();
        store.insert_shard(&spec(100, "sh2", 100)).unwrap();

        assert_eq!(store.shard_for_id(1).unwrap(), Some("sh1".to_string()));
        assert_eq!(store.shard_for_id(150).unwrap(), Some("sh2".to_string()));
        assert_eq!(store.shard_for_id(500).unwrap(), None);
    }

    #[test]
    fn test_shards_overlapping() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_shard(&spec(0, "sh1", 100)).unwrap();
        store.insert_shard(&spec(100, "sh2", 100)).unwrap();

        let both = store.shards_overlapping(0, 200).unwrap();
        assert_eq!(both, vec!["sh1".to_string(), "sh2".to_string()]);

        // Fully outside every shard
        let none = store.shards_overlapping(1000, 2000).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_insert_shard_idempotent() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_shard(&spec(0, "sh1", 100)).unwrap();
        store.bump_valid_idx("sh1", 7).unwrap();
        // Re-init with identical input must not reset valid_idx
        store.insert_shard(&spec(0, "sh1", 100)).unwrap();
        assert_eq!(store.valid_idx("sh1").unwrap(), 7);
        assert_eq!(store.all_shards().unwrap().len(), 1);
    }

    #[test]
    fn test_placements() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_placement("sh1", 100001).unwrap();
        store.insert_placement("sh1", 100002).unwrap();
        store.insert_placement("sh2", 100001).unwrap();

        assert_eq!(
            store.replicas_for_shard("sh1").unwrap(),
            vec![100001, 100002]
        );
        assert_eq!(
            store.shards_for_replica(100001).unwrap(),
            vec!["sh1".to_string(), "sh2".to_string()]
        );
    }

    #[test]
    fn test_set_primary_is_exclusive() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_placement("sh1", 1).unwrap();
        store.insert_placement("sh1", 2).unwrap();
        store.insert_placement("sh1", 3).unwrap();

        store.set_primary("sh1", 2).unwrap();
        assert_eq!(store.primary_for_shard("sh1").unwrap(), Some(2));

        // Re-electing moves the flag, never duplicates it
        store.set_primary("sh1", 3).unwrap();
        assert_eq!(store.primary_for_shard("sh1").unwrap(), Some(3));

        let placements = store.placements_for_replica(2).unwrap();
        assert_eq!(placements, vec![("sh1".to_string(), false)]);
    }

    #[test]
    fn test_reassign_clears_primary() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_placement("sh1", 1).unwrap();
        store.insert_placement("sh2", 1).unwrap();
        store.set_primary("sh1", 1).unwrap();

        store.reassign_replica(1, 9).unwrap();
        assert_eq!(store.shards_for_replica(1).unwrap().len(), 0);
        assert_eq!(
            store.shards_for_replica(9).unwrap(),
            vec!["sh1".to_string(), "sh2".to_string()]
        );
        assert_eq!(store.primary_for_shard("sh1").unwrap(), None);
    }

    #[test]
    fn test_remove_replica() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_placement("sh1", 1).unwrap();
        store.insert_placement("sh1", 2).unwrap();
        store.remove_replica(1).unwrap();
        assert_eq!(store.replicas_for_shard("sh1").unwrap(), vec![2]);
    }

    #[test]
    fn test_valid_idx_monotone() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_shard(&spec(0, "sh1", 100)).unwrap();
        assert_eq!(store.valid_idx("sh1").unwrap(), 0);
        store.bump_valid_idx("sh1", 2).unwrap();
        store.bump_valid_idx("sh1", 3).unwrap();
        assert_eq!(store.valid_idx("sh1").unwrap(), 5);
    }
}
