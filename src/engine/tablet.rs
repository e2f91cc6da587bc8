//! Immutable on-disk sorted table.
//! A tablet is produced by flushing the memtable and is never modified
//! afterwards, which is what lets the backup engine hard-link tablet files
//! into the backup store.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{CofferError, Result};
use crate::types::{Key, Value};

use super::memtable::Lookup;

/// File magic prefixed to every tablet.
const MAGIC: &[u8; 4] = b"CFTB";

/// One immutable sorted table.
///
/// ## File format
/// ```text
/// [magic: "CFTB"][payload: bincode BTreeMap<Key, Option<Value>>][crc32(payload): u32 LE]
/// ```
/// Tombstones are stored, not dropped: a tombstone here must shadow live
/// values in older tablets.
pub struct Tablet {
    path: PathBuf,
    entries: BTreeMap<Key, Option<Value>>,
    /// CRC of the payload as written, kept for later re-verification.
    crc: u32,
}

impl Tablet {
    /// Serialize `entries` to `path` and fsync. Returns the loaded tablet.
    pub fn write(path: PathBuf, entries: &BTreeMap<Key, Option<Value>>) -> Result<Self> {
        let payload = bincode::serialize(entries)
            .map_err(|e| CofferError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        file.write_all(MAGIC)?;
        file.write_all(&payload)?;
        file.write_all(&crc.to_le_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path,
            entries: entries.clone(),
            crc,
        })
    }

    /// Load a tablet from disk, verifying magic and checksum.
    pub fn open(path: PathBuf) -> Result<Self> {
        let (payload, crc) = Self::read_payload(&path)?;
        let entries: BTreeMap<Key, Option<Value>> = bincode::deserialize(&payload)
            .map_err(|e| CofferError::Serialization(format!("tablet {:?}: {}", path, e)))?;
        Ok(Self { path, entries, crc })
    }

    fn read_payload(path: &Path) -> Result<(Vec<u8>, u32)> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        if data.len() < MAGIC.len() + 4 || &data[..MAGIC.len()] != MAGIC {
            return Err(CofferError::Corruption(format!(
                "tablet {:?}: bad magic or truncated file",
                path
            )));
        }
        let payload = data[MAGIC.len()..data.len() - 4].to_vec();
        let tail = &data[data.len() - 4..];
        let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let computed = crc32fast::hash(&payload);
        if stored != computed {
            return Err(CofferError::Corruption(format!(
                "tablet {:?}: CRC mismatch (stored {:#010x}, computed {:#010x})",
                path, stored, computed
            )));
        }
        Ok((payload, stored))
    }

    /// Re-read the backing file and check its checksum against the one
    /// recorded at load time. Catches on-disk rot after open.
    pub fn verify(&self) -> Result<()> {
        let (_, stored) = Self::read_payload(&self.path)?;
        if stored != self.crc {
            return Err(CofferError::Corruption(format!(
                "tablet {:?}: checksum changed since open",
                self.path
            )));
        }
        Ok(())
    }

    /// Three-way point lookup.
    pub fn lookup(&self, key: &[u8]) -> Lookup<'_> {
        match self.entries.get(key) {
            Some(Some(value)) => Lookup::Value(value),
            Some(None) => Lookup::Tombstone,
            None => Lookup::Absent,
        }
    }

    /// All entries in key order, tombstones included.
    pub fn entries(&self) -> &BTreeMap<Key, Option<Value>> {
        &self.entries
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the tablet file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<Key, Option<Value>> {
        let mut m = BTreeMap::new();
        m.insert(b"alpha".to_vec(), Some(b"1".to_vec()));
        m.insert(b"bravo".to_vec(), None); // tombstone
        m.insert(b"charlie".to_vec(), Some(b"3".to_vec()));
        m
    }

    #[test]
    fn test_write_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablet-000001.tbl");
        Tablet::write(path.clone(), &sample()).unwrap();

        let tablet = Tablet::open(path).unwrap();
        assert_eq!(tablet.len(), 3);
        assert_eq!(tablet.lookup(b"alpha"), Lookup::Value(&b"1".to_vec()));
        assert_eq!(tablet.lookup(b"bravo"), Lookup::Tombstone);
        assert_eq!(tablet.lookup(b"delta"), Lookup::Absent);
    }

    #[test]
    fn test_corrupt_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablet-000001.tbl");
        Tablet::write(path.clone(), &sample()).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(
            Tablet::open(path),
            Err(CofferError::Corruption(_))
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablet-000001.tbl");
        std::fs::write(&path, b"NOPE12345678").unwrap();
        assert!(matches!(
            Tablet::open(path),
            Err(CofferError::Corruption(_))
        ));
    }

    #[test]
    fn test_verify_detects_post_open_rot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablet-000001.tbl");
        let tablet = Tablet::write(path.clone(), &sample()).unwrap();
        tablet.verify().unwrap();

        let mut data = std::fs::read(&path).unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();

        assert!(tablet.verify().is_err());
    }
}
