//! The storage engine: memtable + write-ahead log + immutable tablets.
//!
//! The engine is the live-database collaborator of the backup layer. It is
//! opened with [`Options`], written with [`WriteOptions`], read with
//! [`ReadOptions`], and hands the backup engine a consistent set of files
//! through [`Coffer::flush`], [`Coffer::tablet_paths`] and
//! [`Coffer::wal_path`].

pub mod memtable;
pub mod tablet;
pub mod wal;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Options, ReadOptions, WriteOptions};
use crate::error::{CofferError, Result};
use crate::types::{Key, Value};

use self::memtable::{Lookup, MemTable};
use self::tablet::Tablet;
use self::wal::WriteAheadLog;

/// Name of the write-ahead log file inside the WAL directory.
pub const WAL_FILE: &str = "coffer.wal";

/// Result of searching all layers for one key.
enum Hit<'a> {
    /// Served by the memtable.
    Mem(&'a Value),
    /// Served by tablet `i`.
    Tab(usize, &'a Value),
    Miss,
}

/// An open database instance.
///
/// Single-writer discipline: no method is safe to call concurrently from
/// multiple execution contexts without external mutual exclusion.
pub struct Coffer {
    memtable: MemTable,
    wal: WriteAheadLog,
    /// Tablets oldest first; newer tablets shadow older ones.
    tablets: Vec<Tablet>,
    data_dir: PathBuf,
    next_tablet_seq: u64,
}

impl Coffer {
    /// Open or create a database at `path` according to `options`.
    pub fn open(options: &Options, path: impl Into<PathBuf>) -> Result<Self> {
        let opts = options.inner()?;
        let data_dir: PathBuf = path.into();
        let wal_dir = opts.wal_dir.clone().unwrap_or_else(|| data_dir.clone());
        let wal_path = wal_dir.join(WAL_FILE);

        let tablet_files = if data_dir.is_dir() {
            Self::list_tablet_files(&data_dir)?
        } else {
            Vec::new()
        };
        let populated = !tablet_files.is_empty() || wal_path.is_file();

        if populated && opts.error_if_exists {
            return Err(CofferError::Open(format!(
                "database already exists at {:?}",
                data_dir
            )));
        }
        if !populated && !opts.create_if_missing {
            return Err(CofferError::Open(format!(
                "no database at {:?} (set create_if_missing to create one)",
                data_dir
            )));
        }
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&wal_dir)?;

        let mut tablets = Vec::with_capacity(tablet_files.len());
        let mut next_tablet_seq = 1;
        for (seq, file) in tablet_files {
            tablets.push(Tablet::open(file)?);
            next_tablet_seq = seq + 1;
        }

        let memtable = WriteAheadLog::recover(&wal_path, opts.paranoid_checks)?;
        let wal = WriteAheadLog::open(wal_path)?;

        if let Some(env) = &opts.env {
            log::debug!(
                "engine environment: {} background threads, {} high priority",
                env.background_threads(),
                env.high_priority_background_threads()
            );
        }
        log::info!(
            "coffer opened at {:?} ({} tablets, {} WAL entries recovered)",
            data_dir,
            tablets.len(),
            memtable.len()
        );

        Ok(Self {
            memtable,
            wal,
            tablets,
            data_dir,
            next_tablet_seq,
        })
    }

    /// Tablet files under `dir`, sorted by sequence number.
    fn list_tablet_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if let Some(seq) = name
                .strip_prefix("tablet-")
                .and_then(|rest| rest.strip_suffix(".tbl"))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                files.push((seq, path));
            }
        }
        files.sort_by_key(|(seq, _)| *seq);
        Ok(files)
    }

    /// Insert a key-value pair with default write options.
    pub fn put(&mut self, key: Key, value: Value) -> Result<()> {
        self.write(&key, Some(&value), false, false)?;
        self.memtable.put(key, value);
        Ok(())
    }

    /// Insert a key-value pair honoring `write_options`.
    pub fn put_opt(&mut self, write_options: &WriteOptions, key: Key, value: Value) -> Result<()> {
        let wo = write_options.inner()?;
        self.write(&key, Some(&value), wo.disable_wal, wo.sync)?;
        self.memtable.put(key, value);
        Ok(())
    }

    /// Delete a key with default write options.
    pub fn delete(&mut self, key: Key) -> Result<()> {
        self.write(&key, None, false, false)?;
        self.memtable.tombstone(key);
        Ok(())
    }

    /// Delete a key honoring `write_options`.
    pub fn delete_opt(&mut self, write_options: &WriteOptions, key: Key) -> Result<()> {
        let wo = write_options.inner()?;
        self.write(&key, None, wo.disable_wal, wo.sync)?;
        self.memtable.tombstone(key);
        Ok(())
    }

    /// WAL leg of the write path. The WAL record lands before the memtable
    /// is touched so a crash in between replays the operation on reopen.
    fn write(&mut self, key: &Key, value: Option<&Value>, disable_wal: bool, sync: bool) -> Result<()> {
        if disable_wal {
            return Ok(());
        }
        match value {
            Some(v) => self.wal.append_put(key, v, sync),
            None => self.wal.append_delete(key, sync),
        }
    }

    fn find(&self, key: &[u8]) -> Hit<'_> {
        match self.memtable.lookup(key) {
            Lookup::Value(v) => return Hit::Mem(v),
            Lookup::Tombstone => return Hit::Miss,
            Lookup::Absent => {}
        }
        for (i, tablet) in self.tablets.iter().enumerate().rev() {
            match tablet.lookup(key) {
                Lookup::Value(v) => return Hit::Tab(i, v),
                Lookup::Tombstone => return Hit::Miss,
                Lookup::Absent => continue,
            }
        }
        Hit::Miss
    }

    /// Get a value by key with default read options.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        match self.find(key) {
            Hit::Mem(v) | Hit::Tab(_, v) => Some(v.clone()),
            Hit::Miss => None,
        }
    }

    /// Get a value by key honoring `read_options`. With checksum
    /// verification enabled, a read served from a tablet re-verifies that
    /// tablet's file before the value is returned.
    pub fn get_opt(&self, read_options: &ReadOptions, key: &[u8]) -> Result<Option<Value>> {
        let ro = read_options.inner()?;
        match self.find(key) {
            Hit::Mem(v) => Ok(Some(v.clone())),
            Hit::Tab(i, v) => {
                if ro.verify_checksums {
                    self.tablets[i].verify()?;
                }
                Ok(Some(v.clone()))
            }
            Hit::Miss => Ok(None),
        }
    }

    /// Merged view across tablets and the memtable, tombstones included.
    fn merged(&self) -> BTreeMap<Key, Option<Value>> {
        let mut acc = BTreeMap::new();
        for tablet in &self.tablets {
            for (k, v) in tablet.entries() {
                acc.insert(k.clone(), v.clone());
            }
        }
        for (k, v) in self.memtable.entries() {
            acc.insert(k.clone(), v.clone());
        }
        acc
    }

    /// All live key-value pairs in key order.
    pub fn scan(&self) -> Vec<(Key, Value)> {
        self.merged()
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.merged().values().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate size of the in-memory write buffer in bytes.
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Flush the memtable into a new immutable tablet and truncate the WAL.
    /// No-op when the memtable is empty.
    pub fn flush(&mut self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        let seq = self.next_tablet_seq;
        let path = self.data_dir.join(format!("tablet-{:06}.tbl", seq));
        let tablet = Tablet::write(path, self.memtable.entries())?;
        log::info!(
            "flushed {} entries into {:?}",
            tablet.len(),
            tablet.path()
        );
        self.tablets.push(tablet);
        self.next_tablet_seq = seq + 1;
        self.memtable.clear();
        self.wal.truncate()?;
        Ok(())
    }

    /// Fsync the WAL.
    pub fn sync(&mut self) -> Result<()> {
        self.wal.sync()
    }

    /// Database directory.
    pub fn path(&self) -> &Path {
        &self.data_dir
    }

    /// Paths of all live tablet files, oldest first.
    pub fn tablet_paths(&self) -> Vec<PathBuf> {
        self.tablets.iter().map(|t| t.path().to_path_buf()).collect()
    }

    /// Path of the live WAL file.
    pub fn wal_path(&self) -> &Path {
        self.wal.path()
    }
}
