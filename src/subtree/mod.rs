//! The subtree container: a fixed-capacity, power-of-two-sized block of
//! merkle leaves with per-leaf fee and size metadata.
//!
//! A subtree tracks running fee and byte-size aggregates, an ordered list of
//! conflicting transaction hashes, a lazily computed merkle-root cache and a
//! lazily built hash-to-index map. All mutable state sits behind one
//! reader-writer lock; shared references can therefore be handed to
//! concurrent readers while a producer fills the tree. Producers that own
//! the subtree exclusively can use the `_without_lock` fast path, which goes
//! through `&mut self` and never touches the lock.

pub(crate) mod codec;

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::def::COINBASE_PLACEHOLDER;
use crate::error::SubtreeError;
use crate::merkle::builder::build_merkle_tree_store;
use crate::merkle::proof::merkle_proof_for_index;
use crate::store::{NodeStore, SubtreeNode};
use crate::txmap::{HashTxMap, TxMap};
use crate::utils::hasher::TxHash;
use crate::utils::pow2::{ceil_power_of_two, is_power_of_two};

/// A subtree of a block merkle tree. Capacity is `2^height` leaves.
#[derive(Debug)]
pub struct Subtree {
    height: usize,
    state: RwLock<SubtreeState>,
}

#[derive(Debug)]
struct SubtreeState {
    nodes: NodeStore,
    fees: u64,
    size_in_bytes: u64,
    conflicting: Vec<TxHash>,
    root_hash: Option<TxHash>,
    node_index: Option<HashMap<TxHash, usize>>,
}

impl SubtreeState {
    fn new(nodes: NodeStore) -> Self {
        SubtreeState {
            nodes,
            fees: 0,
            size_in_bytes: 0,
            conflicting: Vec::new(),
            root_hash: None,
            node_index: None,
        }
    }

    fn push_node(&mut self, node: SubtreeNode) -> Result<(), SubtreeError> {
        if self.nodes.len() + 1 > self.nodes.capacity() {
            return Err(SubtreeError::Full);
        }
        if node.hash == COINBASE_PLACEHOLDER {
            return Err(SubtreeError::CoinbasePlaceholder);
        }

        self.nodes.push(node);
        self.root_hash = None;
        self.fees += node.fee;
        self.size_in_bytes += node.size_in_bytes;

        if let Some(index) = self.node_index.as_mut() {
            index.insert(node.hash, self.nodes.len() - 1);
        }

        Ok(())
    }

    fn ensure_node_index(&mut self) {
        if self.node_index.is_none() {
            let mut index = HashMap::with_capacity(self.nodes.len());
            for (i, node) in self.nodes.as_slice().iter().enumerate() {
                index.insert(node.hash, i);
            }
            self.node_index = Some(index);
        }
    }

    /// Root of the current leaves, computed on demand and cached until the
    /// next mutation.
    fn compute_root(&mut self) -> Result<Option<TxHash>, SubtreeError> {
        if let Some(root) = self.root_hash {
            return Ok(Some(root));
        }
        if self.nodes.len() == 0 {
            return Ok(None);
        }
        let store = build_merkle_tree_store(self.nodes.as_slice())?;
        let root = store
            .last()
            .copied()
            .ok_or_else(|| SubtreeError::Build("empty store for a non-empty subtree".into()))?;
        self.root_hash = Some(root);
        Ok(Some(root))
    }
}

fn capacity_for_height(height: usize) -> Result<usize, SubtreeError> {
    1usize
        .checked_shl(height as u32)
        .ok_or(SubtreeError::InvalidCapacity(height as i64))
}

impl Subtree {
    /// Creates an empty heap-backed subtree with `2^height` leaf capacity.
    pub fn new(height: usize) -> Result<Subtree, SubtreeError> {
        let capacity = capacity_for_height(height)?;
        Ok(Subtree {
            height,
            state: RwLock::new(SubtreeState::new(NodeStore::heap(capacity))),
        })
    }

    /// Creates a subtree sized for exactly `max_leaves` leaves, which must be
    /// a power of two.
    pub fn with_leaf_count(max_leaves: usize) -> Result<Subtree, SubtreeError> {
        if !is_power_of_two(max_leaves as i64) {
            return Err(SubtreeError::InvalidCapacity(max_leaves as i64));
        }
        Subtree::new(max_leaves.trailing_zeros() as usize)
    }

    /// Creates a subtree large enough for `max_leaves` leaves, rounding the
    /// capacity up to the next power of two.
    pub fn with_max_leaf_count(max_leaves: usize) -> Result<Subtree, SubtreeError> {
        if max_leaves == 0 {
            return Err(SubtreeError::InvalidCapacity(0));
        }
        let capacity = ceil_power_of_two(max_leaves as i64) as usize;
        Subtree::new(capacity.trailing_zeros() as usize)
    }

    /// Creates an empty subtree whose leaves live in a file-backed mmap
    /// region under `dir` instead of the heap.
    pub fn new_mmap(height: usize, dir: impl AsRef<Path>) -> Result<Subtree, SubtreeError> {
        let capacity = capacity_for_height(height)?;
        Ok(Subtree {
            height,
            state: RwLock::new(SubtreeState::new(NodeStore::mmap(capacity, dir.as_ref())?)),
        })
    }

    /// Mmap-backed variant of [`Subtree::with_leaf_count`].
    pub fn with_leaf_count_mmap(
        max_leaves: usize,
        dir: impl AsRef<Path>,
    ) -> Result<Subtree, SubtreeError> {
        if !is_power_of_two(max_leaves as i64) {
            return Err(SubtreeError::InvalidCapacity(max_leaves as i64));
        }
        Subtree::new_mmap(max_leaves.trailing_zeros() as usize, dir)
    }

    /// Assembles a subtree from decoded wire state. The root travels on the
    /// wire and is trusted into the cache, so re-serialisation is
    /// byte-identical without recomputing the tree.
    pub(crate) fn from_wire(
        height: usize,
        nodes: NodeStore,
        fees: u64,
        size_in_bytes: u64,
        conflicting: Vec<TxHash>,
        root_hash: TxHash,
    ) -> Subtree {
        Subtree {
            height,
            state: RwLock::new(SubtreeState {
                nodes,
                fees,
                size_in_bytes,
                conflicting,
                root_hash: Some(root_hash),
                node_index: None,
            }),
        }
    }

    /// Number of merkle levels; capacity is `2^height`.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Leaf capacity.
    pub fn capacity(&self) -> usize {
        self.state.read().nodes.capacity()
    }

    /// Number of leaves currently in the subtree.
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once every capacity slot holds a leaf.
    pub fn is_complete(&self) -> bool {
        let state = self.state.read();
        state.nodes.len() == state.nodes.capacity()
    }

    /// Sum of the fees of all leaves.
    pub fn fees(&self) -> u64 {
        self.state.read().fees
    }

    /// Sum of the serialized sizes of all leaves.
    pub fn size_in_bytes(&self) -> u64 {
        self.state.read().size_in_bytes
    }

    /// True when the leaves live in an mmap-backed store.
    pub fn is_mmap_backed(&self) -> bool {
        self.state.read().nodes.is_mmap()
    }

    /// Adds a leaf under the write lock.
    ///
    /// Fails with [`SubtreeError::Full`] at capacity and with
    /// [`SubtreeError::CoinbasePlaceholder`] when the hash is the placeholder
    /// sentinel, which must go through [`Subtree::add_coinbase_placeholder`].
    pub fn add_node(&self, hash: TxHash, fee: u64, size_in_bytes: u64) -> Result<(), SubtreeError> {
        self.state.write().push_node(SubtreeNode {
            hash,
            fee,
            size_in_bytes,
        })
    }

    /// Adds a prepared leaf record under the write lock.
    pub fn add_subtree_node(&self, node: SubtreeNode) -> Result<(), SubtreeError> {
        self.state.write().push_node(node)
    }

    /// Lock-free add for single-producer fill paths. Exclusive access is
    /// enforced by `&mut self`, so this cannot race shared readers.
    pub fn add_node_without_lock(
        &mut self,
        hash: TxHash,
        fee: u64,
        size_in_bytes: u64,
    ) -> Result<(), SubtreeError> {
        self.state.get_mut().push_node(SubtreeNode {
            hash,
            fee,
            size_in_bytes,
        })
    }

    /// Lock-free variant of [`Subtree::add_subtree_node`].
    pub fn add_subtree_node_without_lock(&mut self, node: SubtreeNode) -> Result<(), SubtreeError> {
        self.state.get_mut().push_node(node)
    }

    /// Reserves index 0 for a coinbase transaction by inserting the
    /// placeholder leaf. Only valid on an empty subtree; the placeholder
    /// carries no fee and no size.
    pub fn add_coinbase_placeholder(&self) -> Result<(), SubtreeError> {
        let mut state = self.state.write();
        if state.nodes.len() != 0 {
            return Err(SubtreeError::CoinbasePlaceholder);
        }
        state.nodes.push(SubtreeNode {
            hash: COINBASE_PLACEHOLDER,
            fee: 0,
            size_in_bytes: 0,
        });
        state.root_hash = None;
        state.fees = 0;
        state.size_in_bytes = 0;
        Ok(())
    }

    /// Overwrites the leaf at index 0 (appending when the subtree is empty)
    /// and returns the recomputed root.
    ///
    /// Aggregate handling mirrors upstream accounting: the new root's size is
    /// added without subtracting the replaced leaf's, and fees stay
    /// untouched. The lazy node index is intentionally not updated either;
    /// callers replacing the root re-resolve indices themselves.
    pub fn replace_root(&self, hash: TxHash, fee: u64, size_in_bytes: u64) -> Option<TxHash> {
        let mut state = self.state.write();
        let node = SubtreeNode {
            hash,
            fee,
            size_in_bytes,
        };
        if state.nodes.len() == 0 {
            state.nodes.push(node);
        } else {
            state.nodes.set(0, node);
        }
        state.root_hash = None;
        state.size_in_bytes += size_in_bytes;
        state.compute_root().unwrap_or_default()
    }

    /// Removes the leaf at `index`; later leaves shift down one position, so
    /// callers holding indices must re-resolve them.
    pub fn remove_node_at(&self, index: usize) -> Result<(), SubtreeError> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if index >= state.nodes.len() {
            return Err(SubtreeError::IndexOutOfRange {
                index,
                len: state.nodes.len(),
            });
        }

        let removed = state.nodes.remove(index);
        state.fees -= removed.fee;
        state.size_in_bytes -= removed.size_in_bytes;
        state.root_hash = None;

        if let Some(node_index) = state.node_index.as_mut() {
            node_index.remove(&removed.hash);
            for (i, node) in state.nodes.as_slice().iter().enumerate().skip(index) {
                node_index.insert(node.hash, i);
            }
        }

        Ok(())
    }

    /// Flags a leaf as conflicting (double-spending) so block assembly can
    /// resolve it later. The hash must already be a leaf of this subtree;
    /// flagging the same hash twice is a silent no-op.
    pub fn add_conflicting_node(&self, hash: TxHash) -> Result<(), SubtreeError> {
        let mut state = self.state.write();
        if !state.nodes.as_slice().iter().any(|n| n.hash == hash) {
            return Err(SubtreeError::NotInSubtree);
        }
        if state.conflicting.contains(&hash) {
            return Ok(());
        }
        state.conflicting.push(hash);
        Ok(())
    }

    /// Index of the leaf with the given hash. Builds the hash-to-index map
    /// on first use; later calls are O(1) lookups under the shared lock.
    pub fn node_index(&self, hash: &TxHash) -> Option<usize> {
        {
            let state = self.state.read();
            if let Some(index) = state.node_index.as_ref() {
                return index.get(hash).copied();
            }
        }
        let mut state = self.state.write();
        state.ensure_node_index();
        state.node_index.as_ref()?.get(hash).copied()
    }

    /// True when the subtree contains a leaf with the given hash.
    pub fn has_node(&self, hash: &TxHash) -> bool {
        self.node_index(hash).is_some()
    }

    /// The leaf record for the given hash.
    pub fn get_node(&self, hash: &TxHash) -> Option<SubtreeNode> {
        let index = self.node_index(hash)?;
        self.node_at(index)
    }

    /// The leaf record at `index`.
    pub fn node_at(&self, index: usize) -> Option<SubtreeNode> {
        self.state.read().nodes.as_slice().get(index).copied()
    }

    /// Snapshot of all leaves in insertion order.
    pub fn nodes(&self) -> Vec<SubtreeNode> {
        self.state.read().nodes.as_slice().to_vec()
    }

    /// Snapshot of the conflicting-hash list in insertion order.
    pub fn conflicting_nodes(&self) -> Vec<TxHash> {
        self.state.read().conflicting.clone()
    }

    /// Fills `map` with `hash -> leaf index` for every leaf.
    pub fn populate_map<M: TxMap>(&self, map: &mut M) -> Result<(), SubtreeError> {
        let state = self.state.read();
        for (i, node) in state.nodes.as_slice().iter().enumerate() {
            map.put(node.hash, i as u64)?;
        }
        Ok(())
    }

    /// Convenience wrapper building a [`HashTxMap`] of `hash -> leaf index`.
    pub fn get_map(&self) -> Result<HashTxMap, SubtreeError> {
        let mut map = HashTxMap::with_capacity(self.len());
        self.populate_map(&mut map)?;
        Ok(map)
    }

    /// The leaves of this subtree that are absent from `ids`.
    pub fn difference<M: TxMap>(&self, ids: &M) -> Vec<SubtreeNode> {
        let state = self.state.read();
        state
            .nodes
            .as_slice()
            .iter()
            .filter(|node| !ids.exists(&node.hash))
            .copied()
            .collect()
    }

    /// Deep copy. The duplicate is always heap-backed regardless of the
    /// source backing, keeps the cached root, and starts without a node
    /// index.
    pub fn duplicate(&self) -> Subtree {
        let state = self.state.read();
        let mut nodes = NodeStore::heap(state.nodes.capacity());
        for node in state.nodes.as_slice() {
            nodes.push(*node);
        }
        Subtree {
            height: self.height,
            state: RwLock::new(SubtreeState {
                nodes,
                fees: state.fees,
                size_in_bytes: state.size_in_bytes,
                conflicting: state.conflicting.clone(),
                root_hash: state.root_hash,
                node_index: None,
            }),
        }
    }

    /// The merkle root over the current leaves, or `None` for an empty
    /// subtree. Computed once and cached until the next mutation.
    pub fn root_hash(&self) -> Option<TxHash> {
        {
            let state = self.state.read();
            if let Some(root) = state.root_hash {
                return Some(root);
            }
        }
        self.state.write().compute_root().unwrap_or_default()
    }

    pub(crate) fn root_hash_checked(&self) -> Result<TxHash, SubtreeError> {
        self.state
            .write()
            .compute_root()?
            .ok_or(SubtreeError::EmptyNodes)
    }

    /// The root this subtree would have after replacing index 0 with the
    /// given leaf. The receiver is never mutated; the computation runs on a
    /// heap-backed clone.
    pub fn root_hash_with_replaced_root(
        &self,
        hash: TxHash,
        fee: u64,
        size_in_bytes: u64,
    ) -> Result<TxHash, SubtreeError> {
        let clone = self.duplicate();
        clone.replace_root(hash, fee, size_in_bytes);
        clone.root_hash_checked()
    }

    /// Sibling path from the leaf at `index` to the root. See the proof
    /// module for the zero-sibling skip rule on incomplete trees.
    pub fn merkle_proof(&self, index: usize) -> Result<Vec<TxHash>, SubtreeError> {
        let state = self.state.read();
        merkle_proof_for_index(state.nodes.as_slice(), index)
    }

    /// Releases backing resources. For mmap subtrees this unmaps the region
    /// and deletes the backing file; repeated calls are no-ops. Heap
    /// subtrees ignore it.
    pub fn close(&self) {
        self.state.write().nodes.close();
    }
}

impl AsRef<Subtree> for Subtree {
    fn as_ref(&self) -> &Subtree {
        self
    }
}
