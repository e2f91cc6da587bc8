//! Point-in-time snapshot of backup-store metadata.

use crate::error::{CofferError, Result};
use crate::handle::Handle;
use crate::types::BackupId;

use super::manifest::BackupRecord;

/// Read-only, indexed view over the backup sequence as it stood when
/// `BackupEngine::get_backup_info` was called.
///
/// Indices run `0..count()` in creation order, oldest first, and are
/// stable for the lifetime of this one snapshot; backups created later do
/// not appear. Call [`BackupInfo::destroy`] exactly once when done — every
/// accessor fails afterwards.
pub struct BackupInfo {
    inner: Handle<Vec<BackupRecord>>,
}

impl BackupInfo {
    pub(crate) fn new(records: Vec<BackupRecord>) -> Self {
        Self {
            inner: Handle::new("backup info", records),
        }
    }

    fn record(&self, index: usize) -> Result<&BackupRecord> {
        let records = self.inner.get()?;
        records.get(index).ok_or(CofferError::IndexOutOfBounds {
            index,
            count: records.len(),
        })
    }

    /// Number of backups captured by this snapshot.
    pub fn count(&self) -> Result<usize> {
        Ok(self.inner.get()?.len())
    }

    /// Id of the `index`-th backup (oldest first).
    pub fn backup_id(&self, index: usize) -> Result<BackupId> {
        Ok(self.record(index)?.id)
    }

    /// Creation time of the `index`-th backup, seconds since the Unix epoch.
    pub fn timestamp(&self, index: usize) -> Result<u64> {
        Ok(self.record(index)?.timestamp)
    }

    /// Total size of the `index`-th backup in bytes.
    pub fn size_bytes(&self, index: usize) -> Result<u64> {
        Ok(self.record(index)?.size_bytes)
    }

    /// Number of files in the `index`-th backup.
    pub fn file_count(&self, index: usize) -> Result<u32> {
        Ok(self.record(index)?.file_count)
    }

    /// Release the snapshot. Must be called exactly once; all accessors
    /// fail after this.
    pub fn destroy(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}
