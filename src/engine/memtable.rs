//! In-memory sorted write buffer.
//! All writes land here after the WAL; flush turns the buffer into an
//! immutable on-disk tablet.

use std::collections::BTreeMap;

use crate::types::{Key, Value};

/// Outcome of a point lookup against one layer of the store.
///
/// `Tombstone` and `Absent` must stay distinct: a tombstone in a newer
/// layer shadows a live value in an older tablet, while `Absent` means
/// the next older layer decides.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    /// Key present with a live value.
    Value(&'a Value),
    /// Key deleted at this layer.
    Tombstone,
    /// Key unknown to this layer.
    Absent,
}

/// Sorted key-value buffer backed by a BTreeMap.
/// A `None` value is a tombstone (deletion marker).
pub struct MemTable {
    entries: BTreeMap<Key, Option<Value>>,
    size_bytes: usize,
}

impl MemTable {
    /// Create a new, empty MemTable.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            size_bytes: 0,
        }
    }

    /// Approximate size of the buffered entries in bytes.
    pub fn size(&self) -> usize {
        self.size_bytes
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a live value.
    pub fn put(&mut self, key: Key, value: Value) {
        self.apply(key, Some(value));
    }

    /// Record a deletion for `key`.
    pub fn tombstone(&mut self, key: Key) {
        self.apply(key, None);
    }

    /// Insert an entry as-is; used by WAL replay and put/tombstone.
    pub fn apply(&mut self, key: Key, value: Option<Value>) {
        if let Some(old) = self.entries.get(&key) {
            let old_size = key.len() + old.as_ref().map_or(0, |v| v.len());
            self.size_bytes = self.size_bytes.saturating_sub(old_size);
        }
        self.size_bytes += key.len() + value.as_ref().map_or(0, |v| v.len());
        self.entries.insert(key, value);
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

    /// Drop all entries and reset the size counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.size_bytes = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_lookup() {
        let mut table = MemTable::new();
        table.put(b"key1".to_vec(), b"value1".to_vec());
        assert_eq!(table.lookup(b"key1"), Lookup::Value(&b"value1".to_vec()));
    }

    #[test]
    fn test_absent_vs_tombstone() {
        let mut table = MemTable::new();
        table.put(b"key".to_vec(), b"value".to_vec());
        table.tombstone(b"key".to_vec());
        assert_eq!(table.lookup(b"key"), Lookup::Tombstone);
        assert_eq!(table.lookup(b"missing"), Lookup::Absent);
        assert_eq!(table.len(), 1); // tombstone still occupies the slot
    }

    #[test]
    fn test_overwrite_keeps_one_entry() {
        let mut table = MemTable::new();
        table.put(b"key".to_vec(), b"old".to_vec());
        table.put(b"key".to_vec(), b"new".to_vec());
        assert_eq!(table.lookup(b"key"), Lookup::Value(&b"new".to_vec()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_size_tracking() {
        let mut table = MemTable::new();
        assert_eq!(table.size(), 0);
        table.put(b"abc".to_vec(), b"12345".to_vec()); // 3 + 5
        assert_eq!(table.size(), 8);
        table.tombstone(b"abc".to_vec()); // value gone, key remains
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn test_clear() {
        let mut table = MemTable::new();
        table.put(b"k1".to_vec(), b"v1".to_vec());
        table.tombstone(b"k2".to_vec());
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.size(), 0);
    }
}
