//! Configuration objects consumed by the engine and the backup engine.
//!
//! Each object is a [`Handle`]-guarded property store: configure it with
//! typed setters, pass it by reference at open/operation time, and close it
//! exactly once after the last use. Setters mutate in place; validation
//! that depends on the filesystem is deferred to open time.
//!
//! Options the underlying engine does not implement (block cache, block
//! size, block restart interval, filter policy) are rejected with
//! [`CofferError::Unsupported`] at configuration time instead of being
//! accepted and ignored.

use std::path::PathBuf;
use std::sync::Arc;

use crate::env::{Env, EnvCore};
use crate::error::{CofferError, Result};
use crate::handle::Handle;

#[derive(Clone)]
pub(crate) struct OptionsInner {
    pub(crate) create_if_missing: bool,
    pub(crate) error_if_exists: bool,
    pub(crate) paranoid_checks: bool,
    /// Directory for WAL files. Defaults to the database directory.
    pub(crate) wal_dir: Option<PathBuf>,
    /// Non-owning reference to a shared environment.
    pub(crate) env: Option<Arc<EnvCore>>,
}

impl OptionsInner {
    fn new() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            wal_dir: None,
            env: None,
        }
    }
}

/// Options for opening a database or a backup engine.
///
/// Close must be called exactly once when the program no longer needs it.
pub struct Options {
    inner: Handle<OptionsInner>,
}

impl Options {
    /// Allocate a new Options object with engine defaults.
    pub fn new() -> Self {
        Self {
            inner: Handle::new("options", OptionsInner::new()),
        }
    }

    /// Create the database on open if it does not already exist.
    /// Default: false.
    pub fn set_create_if_missing(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.create_if_missing = b;
        Ok(())
    }

    /// Fail open if the database already exists. Default: false.
    pub fn set_error_if_exists(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.error_if_exists = b;
        Ok(())
    }

    /// Aggressive checking during open: a torn record at the WAL tail
    /// fails recovery instead of being dropped. Default: false.
    pub fn set_paranoid_checks(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.paranoid_checks = b;
        Ok(())
    }

    /// Keep WAL files in `dir` instead of the database directory.
    pub fn set_wal_dir(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        self.inner.get_mut()?.wal_dir = Some(dir.into());
        Ok(())
    }

    /// Attach a shared environment. The options hold a non-owning reference;
    /// the same `Env` may be attached to any number of `Options`.
    pub fn set_env(&mut self, env: &Env) -> Result<()> {
        let core = env.core()?;
        self.inner.get_mut()?.env = Some(core);
        Ok(())
    }

    /// Block cache configuration is not implemented by this engine.
    pub fn set_cache(&mut self, _capacity_bytes: usize) -> Result<()> {
        self.inner.get()?;
        Err(CofferError::Unsupported("cache"))
    }

    /// Block size tuning is not implemented by this engine.
    pub fn set_block_size(&mut self, _bytes: usize) -> Result<()> {
        self.inner.get()?;
        Err(CofferError::Unsupported("block_size"))
    }

    /// Block restart intervals are not implemented by this engine.
    pub fn set_block_restart_interval(&mut self, _n: usize) -> Result<()> {
        self.inner.get()?;
        Err(CofferError::Unsupported("block_restart_interval"))
    }

    /// Filter policies are not implemented by this engine.
    pub fn set_filter_policy(&mut self, _name: &str) -> Result<()> {
        self.inner.get()?;
        Err(CofferError::Unsupported("filter_policy"))
    }

    pub(crate) fn inner(&self) -> Result<&OptionsInner> {
        self.inner.get()
    }

    /// Release the options handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct ReadOptionsInner {
    pub(crate) verify_checksums: bool,
}

/// Options applied to individual reads.
pub struct ReadOptions {
    inner: Handle<ReadOptionsInner>,
}

impl ReadOptions {
    /// Allocate a new ReadOptions object.
    pub fn new() -> Self {
        Self {
            inner: Handle::new(
                "read options",
                ReadOptionsInner {
                    verify_checksums: false,
                },
            ),
        }
    }

    /// Re-verify the on-disk checksum of any tablet a read is served from.
    /// Default: false.
    pub fn set_verify_checksums(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.verify_checksums = b;
        Ok(())
    }

    pub(crate) fn inner(&self) -> Result<&ReadOptionsInner> {
        self.inner.get()
    }

    /// Release the read-options handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct WriteOptionsInner {
    pub(crate) sync: bool,
    pub(crate) disable_wal: bool,
}

/// Options applied to individual writes.
pub struct WriteOptions {
    inner: Handle<WriteOptionsInner>,
}

impl WriteOptions {
    /// Allocate a new WriteOptions object.
    pub fn new() -> Self {
        Self {
            inner: Handle::new(
                "write options",
                WriteOptionsInner {
                    sync: false,
                    disable_wal: false,
                },
            ),
        }
    }

    /// Fsync the WAL before the write is considered complete.
    /// Default: false.
    pub fn set_sync(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.sync = b;
        Ok(())
    }

    /// Skip the WAL entirely for writes using these options. Such writes
    /// are lost on crash or reopen unless flushed to a tablet first.
    /// Default: false.
    pub fn set_disable_wal(&mut self, b: bool) -> Result<()> {
        self.inner.get_mut()?.disable_wal = b;
        Ok(())
    }

    pub(crate) fn inner(&self) -> Result<&WriteOptionsInner> {
        self.inner.get()
    }

    /// Release the write-options handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Options controlling how a backup is restored.
pub struct RestoreOptions {
    inner: Handle<bool>,
}

impl RestoreOptions {
    /// Allocate restore options with defaults (`keep_log_files = false`).
    pub fn new() -> Self {
        Self {
            inner: Handle::new("restore options", false),
        }
    }

    /// If true, restore will not overwrite existing log files in the WAL
    /// directory; archived logs that collide by name stay in the archive.
    /// If false (default), archived logs replace same-named files and the
    /// archive is emptied of the relocated files.
    pub fn set_keep_log_files(&mut self, b: bool) -> Result<()> {
        *self.inner.get_mut()? = b;
        Ok(())
    }

    pub(crate) fn keep_log_files(&self) -> Result<bool> {
        self.inner.get().copied()
    }

    /// Release the restore-options handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self::new()
    }
}
