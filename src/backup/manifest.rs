//! Backup-store manifest.
//! The MANIFEST file is the source of truth for enumeration: a backup
//! exists once its record is durable here, and never before. Records are
//! append-only; backups are immutable once created.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CofferError, Result};
use crate::types::BackupId;

/// Name of the manifest file inside the backup store directory.
pub const MANIFEST_FILE: &str = "MANIFEST";

/// Metadata of one immutable backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Unique, strictly increasing in creation order.
    pub id: BackupId,
    /// Wall-clock creation time, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Total size of the backup's files in bytes.
    pub size_bytes: u64,
    /// Number of files in the backup.
    pub file_count: u32,
}

/// Append-only record log.
///
/// ## Binary format (per record)
/// ```text
/// [len: u32 LE][payload: bincode BackupRecord][crc32(payload): u32 LE]
/// ```
/// A torn trailing record (crash between write and sync) is dropped with a
/// warning on load; a CRC mismatch on a complete record is corruption.
pub struct Manifest {
    path: PathBuf,
    records: Vec<BackupRecord>,
}

impl Manifest {
    /// Load the manifest of the store at `store_dir`, creating an empty
    /// one in memory if the file does not exist yet.
    pub fn load(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(MANIFEST_FILE);
        let mut records = Vec::new();

        let mut data = Vec::new();
        match std::fs::File::open(&path) {
            Ok(mut f) => {
                f.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self { path, records });
            }
            Err(e) => return Err(e.into()),
        }

        let mut pos = 0usize;
        while pos < data.len() {
            if data.len() - pos < 4 {
                log::warn!(
                    "manifest {:?}: torn length prefix at offset {}, dropping tail",
                    path,
                    pos
                );
                break;
            }
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            let body = pos + 4;
            if data.len() - body < len + 4 {
                log::warn!(
                    "manifest {:?}: torn record at offset {}, dropping tail",
                    path,
                    pos
                );
                break;
            }
            let payload = &data[body..body + len];
            let tail = &data[body + len..body + len + 4];
            let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
            let computed = crc32fast::hash(payload);
            if stored != computed {
                return Err(CofferError::Corruption(format!(
                    "manifest {:?}: record CRC mismatch at offset {}",
                    path, pos
                )));
            }
            let record: BackupRecord = bincode::deserialize(payload)
                .map_err(|e| CofferError::Serialization(format!("manifest {:?}: {}", path, e)))?;
            if let Some(last) = records.last() {
                if record.id <= last.id {
                    return Err(CofferError::Corruption(format!(
                        "manifest {:?}: backup id {} not increasing after {}",
                        path, record.id, last.id
                    )));
                }
            }
            records.push(record);
            pos = body + len + 4;
        }

        Ok(Self { path, records })
    }

    /// Records in creation order, oldest first.
    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    /// The most recent backup, if any.
    pub fn latest(&self) -> Option<&BackupRecord> {
        self.records.last()
    }

    /// Look up one backup by id.
    pub fn find(&self, id: BackupId) -> Option<&BackupRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Next fresh backup id, strictly greater than every existing one.
    pub fn next_id(&self) -> BackupId {
        self.records.last().map_or(1, |r| r.id + 1)
    }

    /// Durably append one record. The record is enumerable only after this
    /// returns Ok.
    pub fn append(&mut self, record: BackupRecord) -> Result<()> {
        if record.id < self.next_id() {
            return Err(CofferError::Backup(format!(
                "backup id {} not greater than existing ids",
                record.id
            )));
        }
        let payload = bincode::serialize(&record)
            .map_err(|e| CofferError::Serialization(e.to_string()))?;
        let mut frame = Vec::with_capacity(payload.len() + 8);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&frame)?;
        file.sync_all()?;

        self.records.push(record);
        Ok(())
    }
}
