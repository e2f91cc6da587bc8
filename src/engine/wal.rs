//! Write-ahead log.
//! Mutations are framed into the log before the memtable is touched, so a
//! crash between the two is replayed on the next open.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{CofferError, Result};
use crate::types::{Key, Value};

use super::memtable::MemTable;

/// Operation tag for WAL records.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
enum OpType {
    Put = 1,
    Delete = 2,
}

/// Append-only mutation log.
///
/// ## Binary format (per record)
/// ```text
/// [op: 1][key_len: u32 LE][key][val_len: u32 LE][value][crc32: u32 LE]
/// ```
/// The CRC covers everything before it. Delete records carry a zero
/// `val_len` and no value bytes.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
}

impl WriteAheadLog {
    /// Open or create a WAL file at `path`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Path of the WAL file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(op: OpType, key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(13 + key.len() + value.len());
        buf.push(op as u8);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Append a PUT record. With `sync`, the record is fsynced before the
    /// call returns.
    pub fn append_put(&mut self, key: &Key, value: &Value, sync: bool) -> Result<()> {
        self.file.write_all(&Self::encode(OpType::Put, key, value))?;
        if sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Append a DELETE record.
    pub fn append_delete(&mut self, key: &Key, sync: bool) -> Result<()> {
        self.file.write_all(&Self::encode(OpType::Delete, key, &[]))?;
        if sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Fsync any buffered records.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncate the log after its contents have been flushed to a tablet.
    pub fn truncate(&mut self) -> Result<()> {
        self.file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.file.sync_all()?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Replay a WAL file into a fresh MemTable.
    ///
    /// A torn record at the tail (crash mid-append) is tolerated: replay
    /// stops there with a warning, or fails with `Corruption` when
    /// `strict` is set (paranoid checks). A CRC mismatch on a complete
    /// record is always corruption.
    pub fn recover(path: &Path, strict: bool) -> Result<MemTable> {
        let mut table = MemTable::new();
        let mut data = Vec::new();
        match File::open(path) {
            Ok(mut f) => {
                f.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(table),
            Err(e) => return Err(e.into()),
        }

        let mut pos = 0usize;
        while pos < data.len() {
            match Self::decode_record(&data[pos..]) {
                Ok(Some((op, key, value, consumed))) => {
                    match op {
                        OpType::Put => table.apply(key, Some(value)),
                        OpType::Delete => table.apply(key, None),
                    }
                    pos += consumed;
                }
                Ok(None) => {
                    if strict {
                        return Err(CofferError::Corruption(format!(
                            "WAL {:?}: truncated record at offset {}",
                            path, pos
                        )));
                    }
                    log::warn!(
                        "WAL {:?}: truncated record at offset {}, dropping tail",
                        path,
                        pos
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(table)
    }

    /// Decode one record from `buf`. Returns `None` if the buffer ends
    /// before the record does.
    fn decode_record(buf: &[u8]) -> Result<Option<(OpType, Key, Value, usize)>> {
        if buf.len() < 5 {
            return Ok(None);
        }
        let op = match buf[0] {
            1 => OpType::Put,
            2 => OpType::Delete,
            other => {
                return Err(CofferError::Corruption(format!(
                    "unknown WAL op tag {}",
                    other
                )))
            }
        };
        let key_len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        let mut pos = 5;
        if buf.len() < pos + key_len + 4 {
            return Ok(None);
        }
        let key = buf[pos..pos + key_len].to_vec();
        pos += key_len;
        let val_len =
            u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as usize;
        pos += 4;
        if buf.len() < pos + val_len + 4 {
            return Ok(None);
        }
        let value = buf[pos..pos + val_len].to_vec();
        pos += val_len;
        let stored =
            u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
        let computed = crc32fast::hash(&buf[..pos]);
        if stored != computed {
            return Err(CofferError::Corruption(format!(
                "WAL record CRC mismatch (stored {:#010x}, computed {:#010x})",
                stored, computed
            )));
        }
        pos += 4;
        Ok(Some((op, key, value, pos)))
    }
}
