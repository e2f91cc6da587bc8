//! Environment: background thread-pool configuration shared by databases.
//!
//! An [`Env`] is referenced, never owned, by the `Options` it is attached
//! to. The shared state lives behind an `Arc`, so any number of `Options`
//! may read one environment concurrently while the owner keeps mutating it
//! through its handle. Closing the `Env` releases the handle (no further
//! setters); attached `Options` keep reading the last configuration.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::handle::Handle;

/// Shared environment state. Plain settings, no synchronization needed
/// beyond atomic loads/stores.
#[derive(Debug)]
pub(crate) struct EnvCore {
    background_threads: AtomicU32,
    high_priority_background_threads: AtomicU32,
}

impl EnvCore {
    fn new() -> Self {
        Self {
            background_threads: AtomicU32::new(1),
            high_priority_background_threads: AtomicU32::new(1),
        }
    }

    pub(crate) fn background_threads(&self) -> u32 {
        self.background_threads.load(Ordering::Relaxed)
    }

    pub(crate) fn high_priority_background_threads(&self) -> u32 {
        self.high_priority_background_threads.load(Ordering::Relaxed)
    }
}

/// Background thread-pool configuration for the storage engine.
///
/// Create with [`Env::new`], attach with `Options::set_env`, and close
/// exactly once after the last `Options` referencing it has been closed.
pub struct Env {
    inner: Handle<Arc<EnvCore>>,
}

impl Env {
    /// Create a default environment (one thread per pool).
    pub fn new() -> Self {
        Self {
            inner: Handle::new("env", Arc::new(EnvCore::new())),
        }
    }

    /// Set the number of LOW priority background threads.
    pub fn set_background_threads(&mut self, n: u32) -> Result<()> {
        self.inner
            .get()?
            .background_threads
            .store(n, Ordering::Relaxed);
        Ok(())
    }

    /// Set the number of HIGH priority background threads.
    pub fn set_high_priority_background_threads(&mut self, n: u32) -> Result<()> {
        self.inner
            .get()?
            .high_priority_background_threads
            .store(n, Ordering::Relaxed);
        Ok(())
    }

    /// Clone the shared core for attachment to an `Options`.
    pub(crate) fn core(&self) -> Result<Arc<EnvCore>> {
        Ok(Arc::clone(self.inner.get()?))
    }

    /// Release the environment handle. Must be called exactly once.
    pub fn close(&mut self) -> Result<()> {
        self.inner.release().map(|_| ())
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
