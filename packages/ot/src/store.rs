//! # Hash-value store
//!
//! Append-only, content-addressed collection of values (annotation
//! definitions, element attributes) that transactions refer to by hash.
//!
//! Each transaction in a [`Change`](crate::Change) carries the store values it
//! newly introduced. The rebase algorithm only needs `merge`, `difference`
//! and `slice`, plus an insertion-ordered list of hashes.
//!
//! The value type is a parameter so callers pick their own codec; the
//! default keeps values as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Content address for a value: `h` + CRC32 of its canonical JSON encoding
pub fn hash_value<V: Serialize>(value: &V) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes);
    Ok(format!("h{:08x}", hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashValueStore<V = Value> {
    /// Hashes in insertion order
    hashes: Vec<String>,

    hash_store: HashMap<String, V>,
}

impl<V> Default for HashValueStore<V> {
    fn default() -> Self {
        Self {
            hashes: Vec::new(),
            hash_store: HashMap::new(),
        }
    }
}

impl<V> HashValueStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn hashes(&self) -> &[String] {
        &self.hashes
    }

    pub fn get(&self, hash: &str) -> Option<&V> {
        self.hash_store.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hash_store.contains_key(hash)
    }

    /// Store a value under a caller-supplied hash. First write wins.
    pub fn insert_with_hash(&mut self, hash: impl Into<String>, value: V) {
        let hash = hash.into();
        if !self.hash_store.contains_key(&hash) {
            self.hashes.push(hash.clone());
            self.hash_store.insert(hash, value);
        }
    }
}

impl<V: Serialize> HashValueStore<V> {
    /// Store a value under its content hash and return the hash
    pub fn insert(&mut self, value: V) -> serde_json::Result<String> {
        let hash = hash_value(&value)?;
        self.insert_with_hash(hash.clone(), value);
        Ok(hash)
    }
}

impl<V: Clone> HashValueStore<V> {
    /// Append every entry of `other` not already present
    pub fn merge(&mut self, other: &HashValueStore<V>) {
        for hash in &other.hashes {
            if let Some(value) = other.hash_store.get(hash) {
                self.insert_with_hash(hash.clone(), value.clone());
            }
        }
    }

    /// Entries of this store whose hash is not in `omit`
    pub fn difference(&self, omit: &HashValueStore<V>) -> HashValueStore<V> {
        let mut store = HashValueStore::new();
        for hash in &self.hashes {
            if omit.contains(hash) {
                continue;
            }
            if let Some(value) = self.hash_store.get(hash) {
                store.insert_with_hash(hash.clone(), value.clone());
            }
        }
        store
    }

    /// Entries `start..end` in insertion order (clamped to the store length)
    pub fn slice(&self, start: usize, end: usize) -> HashValueStore<V> {
        let end = end.min(self.hashes.len());
        let start = start.min(end);
        let mut store = HashValueStore::new();
        for hash in &self.hashes[start..end] {
            if let Some(value) = self.hash_store.get(hash) {
                store.insert_with_hash(hash.clone(), value.clone());
            }
        }
        store
    }
}
