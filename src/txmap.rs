//! Transaction-hash maps fed from a subtree's node list.
//!
//! The subtree never owns the hash-to-index map its consumers want; it
//! populates whichever implementation the caller chose. [`HashTxMap`] is the
//! std implementation used by the tests and by callers without special
//! requirements.

use std::collections::HashMap;

use crate::error::SubtreeError;
use crate::utils::hasher::TxHash;

/// A map from transaction hashes to u64 values (typically leaf indices).
pub trait TxMap {
    /// Inserts or overwrites an entry.
    fn put(&mut self, hash: TxHash, value: u64) -> Result<(), SubtreeError>;

    /// Looks up the value stored for `hash`.
    fn get(&self, hash: &TxHash) -> Option<u64>;

    /// True when `hash` has an entry.
    fn exists(&self, hash: &TxHash) -> bool {
        self.get(hash).is_some()
    }

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored hashes, in no particular order.
    fn keys(&self) -> Vec<TxHash>;
}

/// `TxMap` over a std `HashMap`.
#[derive(Default, Debug, Clone)]
pub struct HashTxMap {
    entries: HashMap<TxHash, u64>,
}

impl HashTxMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HashTxMap {
            entries: HashMap::with_capacity(capacity),
        }
    }
}

impl TxMap for HashTxMap {
    fn put(&mut self, hash: TxHash, value: u64) -> Result<(), SubtreeError> {
        self.entries.insert(hash, value);
        Ok(())
    }

    fn get(&self, hash: &TxHash) -> Option<u64> {
        self.entries.get(hash).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<TxHash> {
        self.entries.keys().copied().collect()
    }
}
