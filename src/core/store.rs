//! Byte-addressable key-value store consumed by the slashing core.
//!
//! The core only needs point reads/writes and ordered prefix scans. `MemStore` is the in-process backend;
//! `CacheStore` buffers writes over a parent store so that a block either commits entirely or not at all.
//!
//! # Determinism
//! Prefix scans return entries in ascending key order. Both backends are `BTreeMap`-based, so iteration
//! order never depends on insertion order.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::keys::prefix_end;
use crate::error::SlashingError;

/// A key-value pair returned by a prefix scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for SlashingError {
    fn from(e: StoreError) -> Self {
        SlashingError::StoreFailure(e.to_string())
    }
}

/// Transactional key-value store interface.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<KvPair>, StoreError>;

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// `BTreeMap`-backed store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn scan_range<'a, V>(
    map: &'a BTreeMap<Vec<u8>, V>,
    prefix: &[u8],
) -> Box<dyn Iterator<Item = (&'a Vec<u8>, &'a V)> + 'a> {
    use std::ops::Bound;
    let start = Bound::Included(prefix.to_vec());
    let end = match prefix_end(prefix) {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    Box::new(map.range((start, end)))
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<KvPair>, StoreError> {
        Ok(scan_range(&self.data, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Write-buffering overlay. Reads check pending writes first, then fall through to the parent;
/// nothing reaches the parent until the changes are flushed with `apply_changes`.
#[derive(Debug)]
pub struct CacheStore<'a, P: KvStore + ?Sized> {
    parent: &'a P,
    /// `None` marks a pending delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, P: KvStore + ?Sized> CacheStore<'a, P> {
    pub fn new(parent: &'a P) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consumes the overlay, returning the buffered changes for `apply_changes`.
    pub fn into_changes(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.pending.into_iter().collect()
    }
}

/// Flushes overlay changes into a store in key order.
pub fn apply_changes<S: KvStore + ?Sized>(
    store: &mut S,
    changes: Vec<(Vec<u8>, Option<Vec<u8>>)>,
) -> Result<(), StoreError> {
    for (key, value) in changes {
        match value {
            Some(v) => store.set(&key, &v)?,
            None => store.delete(&key)?,
        }
    }
    Ok(())
}

impl<'a, P: KvStore + ?Sized> KvStore for CacheStore<'a, P> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.pending.get(key) {
            Some(v) => Ok(v.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<KvPair>, StoreError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_scan(prefix)?.into_iter().collect();
        for (k, v) in scan_range(&self.pending, prefix) {
            match v {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}
