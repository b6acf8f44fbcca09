//! The inpoint set: every previous-output reference consumed by a
//! transaction's inputs, grouped by parent transaction.
//!
//! Parent hashes are kept unique in first-occurrence order; the output
//! indices of each parent are collected in input order and may repeat. The
//! codec writes u32 lengths throughout, clamping oversized lists.

use std::io::{Cursor, Read};

use crate::error::SubtreeError;
use crate::utils::codec::{read_hash, read_u32};
use crate::utils::hasher::TxHash;

/// One previous-output reference: parent transaction id plus output index.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Inpoint {
    pub hash: TxHash,
    pub index: u32,
}

/// The grouped inpoints of a transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct TxInpoints {
    /// Unique parent transaction hashes in first-occurrence order.
    pub parent_tx_hashes: Vec<TxHash>,
    /// `idxs[i]` lists every referenced output index of `parent_tx_hashes[i]`.
    pub idxs: Vec<Vec<u32>>,
    /// Position of the parent's subtree during assembly; -1 until assigned.
    pub subtree_index: i16,

    total: usize,
}

impl Default for TxInpoints {
    fn default() -> Self {
        Self::new()
    }
}

impl TxInpoints {
    pub fn new() -> TxInpoints {
        TxInpoints {
            parent_tx_hashes: Vec::with_capacity(8),
            idxs: Vec::with_capacity(16),
            subtree_index: -1,
            total: 0,
        }
    }

    /// Builds the set from `(previous txid, previous vout)` pairs in input
    /// order. Transactions without inputs yield an empty set; seeded chains
    /// carry such transactions, so that is not an error.
    pub fn from_outpoints(outpoints: &[(TxHash, u32)]) -> TxInpoints {
        let mut inpoints = TxInpoints::new();
        for &(hash, vout) in outpoints {
            inpoints.add_outpoint(hash, vout);
        }
        inpoints
    }

    /// Records one consumed output, merging it into the existing parent
    /// entry when the hash was seen before.
    pub fn add_outpoint(&mut self, hash: TxHash, vout: u32) {
        match self.parent_tx_hashes.iter().position(|h| *h == hash) {
            Some(i) => self.idxs[i].push(vout),
            None => {
                self.parent_tx_hashes.push(hash);
                self.idxs.push(vec![vout]);
            }
        }
        self.total += 1;
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<TxInpoints, SubtreeError> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<TxInpoints, SubtreeError> {
        let num_parents = read_u32(&mut reader, "number of parent inpoints")?;
        let mut inpoints = TxInpoints::new();
        if num_parents == 0 {
            return Ok(inpoints);
        }

        let num_parents = num_parents as usize;
        inpoints.parent_tx_hashes = Vec::with_capacity(num_parents);
        for _ in 0..num_parents {
            inpoints
                .parent_tx_hashes
                .push(read_hash(&mut reader, "parent tx hash")?);
        }

        inpoints.idxs = Vec::with_capacity(num_parents);
        for _ in 0..num_parents {
            let num_indices = read_u32(&mut reader, "number of parent indexes")? as usize;
            let mut indices = Vec::with_capacity(num_indices.min(1024));
            for _ in 0..num_indices {
                indices.push(read_u32(&mut reader, "parent index")?);
            }
            inpoints.total += indices.len();
            inpoints.idxs.push(indices);
        }

        Ok(inpoints)
    }

    /// The unique parent transaction hashes.
    pub fn parent_tx_hashes(&self) -> &[TxHash] {
        &self.parent_tx_hashes
    }

    pub fn parent_hash_at(&self, index: usize) -> Result<TxHash, SubtreeError> {
        self.parent_tx_hashes
            .get(index)
            .copied()
            .ok_or(SubtreeError::IndexOutOfRange {
                index,
                len: self.parent_tx_hashes.len(),
            })
    }

    pub fn vouts_at(&self, index: usize) -> Result<&[u32], SubtreeError> {
        self.idxs
            .get(index)
            .map(Vec::as_slice)
            .ok_or(SubtreeError::IndexOutOfRange {
                index,
                len: self.idxs.len(),
            })
    }

    /// Expands the grouped form back into one `Inpoint` per consumed output.
    pub fn inpoints(&self) -> Vec<Inpoint> {
        let mut out = Vec::with_capacity(self.total);
        for (hash, indices) in self.parent_tx_hashes.iter().zip(&self.idxs) {
            for &index in indices {
                out.push(Inpoint { hash: *hash, index });
            }
        }
        out
    }

    /// Total number of inpoints across all parents.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Wire encoding: parent count, parent hashes, then one length-prefixed
    /// index list per parent.
    pub fn serialize(&self) -> Result<Vec<u8>, SubtreeError> {
        if self.parent_tx_hashes.len() != self.idxs.len() {
            return Err(SubtreeError::InpointsMismatch);
        }

        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&len32(&self.parent_tx_hashes).to_le_bytes());

        for hash in &self.parent_tx_hashes {
            buf.extend_from_slice(hash.as_bytes());
        }

        for indices in &self.idxs {
            buf.extend_from_slice(&len32(indices).to_le_bytes());
            for index in indices {
                buf.extend_from_slice(&index.to_le_bytes());
            }
        }

        Ok(buf)
    }
}

/// List length as a u32, clamped at `u32::MAX` for absurd inputs.
fn len32<V>(list: &[V]) -> u32 {
    list.len().try_into().unwrap_or(u32::MAX)
}
