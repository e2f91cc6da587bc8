//! Core type definitions used across the engine and backup layers.

/// Key type for the storage engine.
/// Using Vec<u8> allows arbitrary binary keys.
pub type Key = Vec<u8>;

/// Value type for the storage engine.
/// Using Vec<u8> allows arbitrary binary values.
pub type Value = Vec<u8>;

/// Identifier of one backup within a backup store.
/// Ids are unique and strictly increasing in creation order.
pub type BackupId = u32;
