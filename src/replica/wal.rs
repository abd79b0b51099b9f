//! Write-ahead log for the replica agent
//!
//! One newline-delimited JSON record per mutation, appended and fsynced
//! before the shard store is touched. The file is created on first
//! append; its line count is the replica's WAL length, which the
//! controller compares during primary election.
//!
//! The log is not replayed on restart. Recovery after replacement is
//! `/copy`-based; the WAL exists for durability ordering and election.

use crate::common::types::WalRecord;
use crate::common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const WAL_FILE_NAME: &str = "wal.txt";

pub struct Wal {
    dir: PathBuf,
    path: PathBuf,
}

impl Wal {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(WAL_FILE_NAME);
        Self { dir, path }
    }

    /// Append one record and fsync. Any failure here is a `Durability`
    /// error and the caller must not touch the shard store.
    pub fn append(&self, record: &WalRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Durability(format!("creating WAL directory: {}", e)))?;

        let mut line = serde_json::to_vec(record)
            .map_err(|e| Error::Durability(format!("encoding WAL record: {}", e)))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Durability(format!("opening WAL file: {}", e)))?;

        file.write_all(&line)
            .map_err(|e| Error::Durability(format!("writing WAL record: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::Durability(format!("syncing WAL file: {}", e)))?;

        Ok(())
    }

    /// Number of newline-terminated records, or 0 if the file does not
    /// exist yet.
    pub fn length(&self) -> Result<usize> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut buf = [0u8; 32 * 1024];
        let mut count = 0;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            count += buf[..n].iter().filter(|b| **b == b'\n').count();
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
