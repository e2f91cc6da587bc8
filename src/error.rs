//! Error types shared by the configuration, engine, and backup layers.

use thiserror::Error;

/// Custom Result type for the coffer crate.
pub type Result<T> = std::result::Result<T, CofferError>;

/// Error kinds surfaced by coffer operations.
///
/// Every fallible operation returns one of these synchronously; nothing is
/// retried internally. Retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum CofferError {
    /// I/O errors from file operations (WAL, tablets, backup store).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (CRC mismatch, bad framing).
    #[error("data corruption detected: {0}")]
    Corruption(String),

    /// Database or backup store could not be opened.
    #[error("open failed: {0}")]
    Open(String),

    /// A backup could not be created; the store is left unchanged.
    #[error("backup failed: {0}")]
    Backup(String),

    /// Restore failed partway; db_dir state is not guaranteed clean, but
    /// clearing it and retrying the same call must be able to succeed.
    #[error("restore failed: {0}")]
    Restore(String),

    /// Restore requested against a store with no matching backup.
    #[error("no backup found in the backup store")]
    NotFound,

    /// A handle was used after it was closed/destroyed.
    #[error("{0} handle already released")]
    Released(&'static str),

    /// A BackupInfo accessor was called with an index outside 0..count.
    #[error("backup index {index} out of bounds (count {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    /// A configuration option this build does not implement. Rejected at
    /// configuration time rather than accepted and ignored.
    #[error("unsupported option: {0}")]
    Unsupported(&'static str),
}
