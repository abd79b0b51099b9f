//! Local shard store for the replica agent
//!
//! One SQLite table per hosted shard, created by `/config` from the
//! supplied schema. Mutations run inside a transaction and roll back on
//! error, so a failed commit leaves no partial state behind the WAL.

use crate::common::types::{Record, Schema};
use crate::common::{Error, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

pub struct ShardStore {
    conn: Mutex<Connection>,
}

/// Shard ids become table names; reject anything that is not a plain
/// identifier before it reaches SQL.
fn validate_shard_name(shard: &str) -> Result<()> {
    let mut chars = shard.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::BadArgument(format!("invalid shard name: {}", shard)))
    }
}

fn column_type(dtype: &str) -> &'static str {
    match dtype {
        "Number" => "INTEGER",
        _ => "TEXT",
    }
}

impl ShardStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        // journal_mode returns the resulting mode as a row
        conn.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create one table per shard from the schema.
    pub fn configure(&self, schema: &Schema, shards: &[String]) -> Result<()> {
        if schema.columns.len() != schema.dtypes.len() {
            return Err(Error::BadArgument(
                "schema columns and dtypes length mismatch".into(),
            ));
        }

        let columns: Vec<String> = schema
            .columns
            .iter()
            .zip(schema.dtypes.iter())
            .map(|(col, dtype)| format!("{} {}", col, column_type(dtype)))
            .collect();
        let column_sql = columns.join(", ");

        let conn = self.conn.lock().unwrap();
        for shard in shards {
            validate_shard_name(shard)?;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                shard, column_sql
            ))?;
        }
        Ok(())
    }

    /// Insert a batch inside a single transaction; any failure rolls the
    /// whole batch back.
    pub fn insert_records(&self, shard: &str, records: &[Record]) -> Result<()> {
        validate_shard_name(shard)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (Stud_id, Stud_name, Stud_marks) VALUES (?1, ?2, ?3)",
                shard
            ))?;
            for record in records {
                stmt.execute(params![record.stud_id, record.stud_name, record.stud_marks])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Rows with `Stud_id BETWEEN low AND high`.
    pub fn read_range(&self, shard: &str, low: i64, high: i64) -> Result<Vec<Record>> {
        validate_shard_name(shard)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT Stud_id, Stud_name, Stud_marks FROM {} WHERE Stud_id BETWEEN ?1 AND ?2",
            shard
        ))?;
        let rows = stmt.query_map(params![low, high], |row| {
            Ok(Record {
                stud_id: row.get(0)?,
                stud_name: row.get(1)?,
                stud_marks: row.get(2)?,
            })
        })?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    /// Every row of a shard (used by `/copy`).
    pub fn dump(&self, shard: &str) -> Result<Vec<Record>> {
        validate_shard_name(shard)?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT Stud_id, Stud_name, Stud_marks FROM {}",
            shard
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(Record {
                stud_id: row.get(0)?,
                stud_name: row.get(1)?,
                stud_marks: row.get(2)?,
            })
        })?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    pub fn update_record(&self, shard: &str, stud_id: i64, record: &Record) -> Result<()> {
        validate_shard_name(shard)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "UPDATE {} SET Stud_name = ?1, Stud_marks = ?2 WHERE Stud_id = ?3",
                shard
            ),
            params![record.stud_name, record.stud_marks, stud_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_record(&self, shard: &str, stud_id: i64) -> Result<()> {
        validate_shard_name(shard)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {} WHERE Stud_id = ?1", shard),
            params![stud_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, marks: i64) -> Record {
        Record {
            stud_id: id,
            stud_name: name.to_string(),
            stud_marks: marks,
        }
    }

    fn store_with_shard(shard: &str) -> ShardStore {
        let store = ShardStore::open_in_memory().unwrap();
        store
            .configure(&Schema::student(), &[shard.to_string()])
            .unwrap();
        store
    }

    #[test]
    fn test_configure_creates_tables() {
        let store = ShardStore::open_in_memory().unwrap();
        store
            .configure(&Schema::student(), &["sh1".to_string(), "sh2".to_string()])
            .unwrap();
        assert!(store.read_range("sh1", 0, 100).unwrap().is_empty());
        assert!(store.read_range("sh2", 0, 100).unwrap().is_empty());
    }

    #[test]
    fn test_configure_is_idempotent() {
        let store = store_with_shard("sh1");
        store.insert_records("sh1", &[record(1, "a", 50)]).unwrap();
        store
            .configure(&Schema::student(), &["sh1".to_string()])
            .unwrap();
        assert_eq!(store.read_range("sh1", 0, 100).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_and_read_range() {
        let store = store_with_shard("sh1");
        store
            .insert_records(
                "sh1",
                &[record(1, "a", 50), record(5, "b", 60), record(99, "c", 70)],
            )
            .unwrap();

        let rows = store.read_range("sh1", 0, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stud_name, "a");

        let all = store.read_range("sh1", 0, 100).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_insert_into_missing_shard_fails() {
        let store = store_with_shard("sh1");
        assert!(store.insert_records("sh9", &[record(1, "a", 1)]).is_err());
    }

    #[test]
    fn test_update() {
        let store = store_with_shard("sh1");
        store.insert_records("sh1", &[record(1, "a", 50)]).unwrap();
        store
            .update_record("sh1", 1, &record(1, "a", 95))
            .unwrap();
        let rows = store.read_range("sh1", 1, 1).unwrap();
        assert_eq!(rows[0].stud_marks, 95);
    }

    #[test]
    fn test_delete() {
        let store = store_with_shard("sh1");
        store
            .insert_records("sh1", &[record(1, "a", 50), record(2, "b", 60)])
            .unwrap();
        store.delete_record("sh1", 1).unwrap();
        let rows = store.read_range("sh1", 0, 100).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stud_id, 2);
    }

    #[test]
    fn test_dump() {
        let store = store_with_shard("sh1");
        store
            .insert_records("sh1", &[record(1, "a", 50), record(2, "b", 60)])
            .unwrap();
        assert_eq!(store.dump("sh1").unwrap().len(), 2);
    }

    #[test]
    fn test_shard_name_validation() {
        assert!(validate_shard_name("sh1").is_ok());
        assert!(validate_shard_name("_shard_2").is_ok());
        assert!(validate_shard_name("sh-1").is_err());
        assert!(validate_shard_name("1sh").is_err());
        assert!(validate_shard_name("sh1; DROP TABLE sh1").is_err());
        assert!(validate_shard_name("").is_err());
    }
}
