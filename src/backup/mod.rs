//! Backup engine: snapshots a live database into a backup store and
//! restores a database directory from a chosen backup.
//!
//! ## Store layout
//! ```text
//! store/
//!   MANIFEST        enumeration source of truth (see manifest module)
//!   <id>/data/      tablet files, hard-linked or copied
//!   <id>/wal/       WAL file(s) captured at backup time
//!   <id>.tmp/       staging; swept at open, never enumerated
//! ```
//! A backup becomes visible only when its manifest record is durable, after
//! its directory has been renamed into place. A failed backup leaves the
//! store as it was. Open sweeps whatever a crashed backup left behind:
//! staging dirs and renamed-but-unrecorded `<id>/` dirs.
//!
//! Single-writer discipline applies per engine instance; independent
//! engines over different store paths are fully independent.

pub mod info;
pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Options, RestoreOptions};
use crate::engine::Coffer;
use crate::error::{CofferError, Result};
use crate::handle::Handle;
use crate::types::BackupId;

use self::info::BackupInfo;
use self::manifest::{BackupRecord, Manifest};

struct BackupEngineInner {
    store_dir: PathBuf,
    manifest: Manifest,
}

/// Handle on one backup store.
///
/// Close exactly once, after every [`BackupInfo`] derived from this engine
/// has been destroyed.
pub struct BackupEngine {
    inner: Handle<BackupEngineInner>,
}

impl BackupEngine {
    /// Open a backup store at `store_path`, creating it if absent.
    ///
    /// On failure no engine handle is allocated.
    pub fn open(options: &Options, store_path: impl Into<PathBuf>) -> Result<Self> {
        options.inner()?;
        let store_dir: PathBuf = store_path.into();
        fs::create_dir_all(&store_dir)
            .map_err(|e| CofferError::Open(format!("backup store {:?}: {}", store_dir, e)))?;

        let manifest = Manifest::load(&store_dir)?;
        Self::sweep_leftovers(&store_dir, &manifest)?;
        log::info!(
            "backup store opened at {:?} ({} backups)",
            store_dir,
            manifest.records().len()
        );

        Ok(Self {
            inner: Handle::new(
                "backup engine",
                BackupEngineInner {
                    store_dir,
                    manifest,
                },
            ),
        })
    }

    /// Remove leftovers from crashed backups: `<id>.tmp` staging dirs and
    /// numbered dirs with no manifest record (crash between the publish
    /// rename and the manifest append). Neither was ever enumerable, and an
    /// unrecorded numbered dir would block the next backup that reuses its
    /// id.
    fn sweep_leftovers(store_dir: &Path, manifest: &Manifest) -> Result<()> {
        for entry in fs::read_dir(store_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let stale = if path.extension().map_or(false, |ext| ext == "tmp") {
                true
            } else {
                match parse_backup_id(&path) {
                    Some(id) => manifest.find(id).is_none(),
                    None => false,
                }
            };
            if stale {
                log::warn!("removing leftover backup dir {:?}", path);
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    /// Snapshot `db` into the store as one new immutable backup.
    ///
    /// Flushes the engine, stages file copies under `<id>.tmp`, renames the
    /// staging directory into place, and appends the manifest record last.
    /// Either a complete backup becomes enumerable or the store is left
    /// unchanged. Returns the fresh backup id.
    pub fn create_new_backup(&mut self, db: &mut Coffer) -> Result<BackupId> {
        let inner = self.inner.get_mut()?;

        db.flush()
            .map_err(|e| CofferError::Backup(format!("engine flush: {}", e)))?;
        db.sync()
            .map_err(|e| CofferError::Backup(format!("engine sync: {}", e)))?;

        let id = inner.manifest.next_id();
        let staging = inner.store_dir.join(format!("{}.tmp", id));
        let final_dir = inner.store_dir.join(id.to_string());

        // A directory already squatting on this id has no manifest record
        // (ids at or above next_id are never recorded), so it is a crash
        // leftover and must not block the publish rename.
        if final_dir.exists() {
            log::warn!("removing leftover backup dir {:?}", final_dir);
            fs::remove_dir_all(&final_dir)
                .map_err(|e| CofferError::Backup(format!("clearing {:?}: {}", final_dir, e)))?;
        }

        let staged = Self::stage_files(db, &staging).and_then(|counts| {
            fs::rename(&staging, &final_dir)
                .map_err(|e| CofferError::Backup(format!("publishing backup {}: {}", id, e)))?;
            Ok(counts)
        });
        let (size_bytes, file_count) = match staged {
            Ok(counts) => counts,
            Err(e) => {
                // Leave the store exactly as it was.
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let record = BackupRecord {
            id,
            timestamp: unix_timestamp(),
            size_bytes,
            file_count,
        };
        if let Err(e) = inner.manifest.append(record) {
            let _ = fs::remove_dir_all(&final_dir);
            return Err(CofferError::Backup(format!(
                "recording backup {} in manifest: {}",
                id, e
            )));
        }

        log::info!(
            "created backup {} ({} files, {} bytes)",
            id,
            file_count,
            size_bytes
        );
        Ok(id)
    }

    /// Copy the engine's live files into `staging`. Tablets are immutable,
    /// so hard links are attempted first; the WAL is always copied because
    /// the live file keeps changing.
    fn stage_files(db: &Coffer, staging: &Path) -> Result<(u64, u32)> {
        let data_dir = staging.join("data");
        let wal_dir = staging.join("wal");
        fs::create_dir_all(&data_dir)
            .map_err(|e| CofferError::Backup(format!("staging {:?}: {}", data_dir, e)))?;
        fs::create_dir_all(&wal_dir)
            .map_err(|e| CofferError::Backup(format!("staging {:?}: {}", wal_dir, e)))?;

        let mut size_bytes = 0u64;
        let mut file_count = 0u32;

        for src in db.tablet_paths() {
            let dst = data_dir.join(file_name(&src)?);
            if fs::hard_link(&src, &dst).is_err() {
                fs::copy(&src, &dst)
                    .map_err(|e| CofferError::Backup(format!("copying {:?}: {}", src, e)))?;
            }
            size_bytes += file_len(&dst)?;
            file_count += 1;
        }

        let wal_src = db.wal_path();
        if wal_src.is_file() {
            let dst = wal_dir.join(file_name(wal_src)?);
            fs::copy(wal_src, &dst)
                .map_err(|e| CofferError::Backup(format!("copying {:?}: {}", wal_src, e)))?;
            size_bytes += file_len(&dst)?;
            file_count += 1;
        }

        Ok((size_bytes, file_count))
    }

    /// Snapshot the current backup sequence into an indexed, read-only
    /// view. The snapshot goes stale (but stays valid) once newer backups
    /// are created; destroy it explicitly before closing this engine.
    pub fn get_backup_info(&self) -> Result<BackupInfo> {
        let inner = self.inner.get()?;
        Ok(BackupInfo::new(inner.manifest.records().to_vec()))
    }

    /// Reconstruct a database directory at `db_dir` (and WAL directory at
    /// `wal_dir`) from the backup with the greatest id.
    ///
    /// An empty store fails with [`CofferError::NotFound`] before any
    /// filesystem mutation. Restore is not transactional against partial
    /// writes to `db_dir`; after a failure, clearing `db_dir` and retrying
    /// the same call succeeds (the store itself is never mutated).
    pub fn restore_from_latest_backup(
        &self,
        db_dir: impl AsRef<Path>,
        wal_dir: impl AsRef<Path>,
        restore_options: &RestoreOptions,
    ) -> Result<()> {
        let inner = self.inner.get()?;
        let keep_log_files = restore_options.keep_log_files()?;
        let latest = inner.manifest.latest().ok_or(CofferError::NotFound)?;
        Self::restore(inner, latest.id, db_dir.as_ref(), wal_dir.as_ref(), keep_log_files)
    }

    /// Reconstruct from one specific backup id.
    pub fn restore_from_backup(
        &self,
        id: BackupId,
        db_dir: impl AsRef<Path>,
        wal_dir: impl AsRef<Path>,
        restore_options: &RestoreOptions,
    ) -> Result<()> {
        let inner = self.inner.get()?;
        let keep_log_files = restore_options.keep_log_files()?;
        let record = inner.manifest.find(id).ok_or(CofferError::NotFound)?;
        Self::restore(inner, record.id, db_dir.as_ref(), wal_dir.as_ref(), keep_log_files)
    }

    fn restore(
        inner: &BackupEngineInner,
        id: BackupId,
        db_dir: &Path,
        wal_dir: &Path,
        keep_log_files: bool,
    ) -> Result<()> {
        let backup_dir = inner.store_dir.join(id.to_string());
        if !backup_dir.is_dir() {
            return Err(CofferError::Corruption(format!(
                "backup {} listed in manifest but missing from the store",
                id
            )));
        }
        fs::create_dir_all(db_dir)
            .map_err(|e| CofferError::Restore(format!("creating {:?}: {}", db_dir, e)))?;
        fs::create_dir_all(wal_dir)
            .map_err(|e| CofferError::Restore(format!("creating {:?}: {}", wal_dir, e)))?;

        // Data files straight into the database directory.
        copy_dir_files(&backup_dir.join("data"), db_dir)?;

        // Log files are staged into the archive directory, then relocated.
        let archive = wal_dir.join("archive");
        fs::create_dir_all(&archive)
            .map_err(|e| CofferError::Restore(format!("creating {:?}: {}", archive, e)))?;
        copy_dir_files(&backup_dir.join("wal"), &archive)?;

        for entry in fs::read_dir(&archive).map_err(CofferError::Io)? {
            let src = entry.map_err(CofferError::Io)?.path();
            if !src.is_file() {
                continue;
            }
            let dst = wal_dir.join(file_name(&src)?);
            if keep_log_files && dst.exists() {
                log::info!("keeping existing log file {:?}", dst);
                continue;
            }
            fs::rename(&src, &dst)
                .map_err(|e| CofferError::Restore(format!("relocating {:?}: {}", src, e)))?;
        }

        log::info!("restored backup {} into {:?}", id, db_dir);
        Ok(())
    }

    /// Release the backup-store handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

/// Copy every regular file in `src_dir` (if it exists) into `dst_dir`.
fn copy_dir_files(src_dir: &Path, dst_dir: &Path) -> Result<()> {
    if !src_dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(src_dir).map_err(CofferError::Io)? {
        let src = entry.map_err(CofferError::Io)?.path();
        if !src.is_file() {
            continue;
        }
        let dst = dst_dir.join(file_name(&src)?);
        fs::copy(&src, &dst)
            .map_err(|e| CofferError::Restore(format!("copying {:?}: {}", src, e)))?;
    }
    Ok(())
}

/// Backup id encoded in a store directory name, if the name is one.
fn parse_backup_id(path: &Path) -> Option<BackupId> {
    path.file_name()?.to_str()?.parse().ok()
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        CofferError::Restore(format!("path {:?} has no file name", path))
    })
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
