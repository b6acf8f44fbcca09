//! Bounded leaf-node storage with selectable backing.
//!
//! A subtree's leaves live either in a plain heap vector or in a file-backed
//! mmap region. Both backings present the same surface: a bounded slice of
//! [`SubtreeNode`] with `len <= capacity`. Callers cannot tell them apart by
//! behaviour; only resource usage differs.

mod mmap;

use std::mem;
use std::path::Path;

pub(crate) use mmap::MmapNodeStore;

use crate::error::SubtreeError;
use crate::utils::hasher::TxHash;

/// One leaf record: a transaction id plus its fee and serialized size.
///
/// The layout is fixed at 48 contiguous bytes with no pointers or padding,
/// which is what allows reinterpreting an mmap'd byte region as a node
/// array. Keep it that way: adding any reference-carrying field would break
/// the off-heap backing.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SubtreeNode {
    pub hash: TxHash,
    pub fee: u64,
    pub size_in_bytes: u64,
}

/// Size of one node record in bytes.
pub const NODE_SIZE: usize = mem::size_of::<SubtreeNode>();

const _: () = assert!(NODE_SIZE == 48, "SubtreeNode must stay 48 pointer-free bytes");

/// Bounded node array behind a heap or mmap backing.
#[derive(Debug)]
pub(crate) enum NodeStore {
    Heap { nodes: Vec<SubtreeNode>, capacity: usize },
    Mmap(MmapNodeStore),
}

impl NodeStore {
    pub(crate) fn heap(capacity: usize) -> NodeStore {
        NodeStore::Heap {
            nodes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn mmap(capacity: usize, dir: &Path) -> Result<NodeStore, SubtreeError> {
        Ok(NodeStore::Mmap(MmapNodeStore::new(capacity, dir)?))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            NodeStore::Heap { nodes, .. } => nodes.len(),
            NodeStore::Mmap(store) => store.len(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        match self {
            NodeStore::Heap { capacity, .. } => *capacity,
            NodeStore::Mmap(store) => store.capacity(),
        }
    }

    pub(crate) fn is_mmap(&self) -> bool {
        matches!(self, NodeStore::Mmap(_))
    }

    pub(crate) fn as_slice(&self) -> &[SubtreeNode] {
        match self {
            NodeStore::Heap { nodes, .. } => nodes,
            NodeStore::Mmap(store) => store.as_slice(),
        }
    }

    /// Appends a node. The caller is responsible for the capacity check; the
    /// store itself only asserts the bound.
    pub(crate) fn push(&mut self, node: SubtreeNode) {
        match self {
            NodeStore::Heap { nodes, capacity } => {
                assert!(nodes.len() < *capacity, "node store overflow");
                nodes.push(node);
            }
            NodeStore::Mmap(store) => store.push(node),
        }
    }

    pub(crate) fn set(&mut self, index: usize, node: SubtreeNode) {
        match self {
            NodeStore::Heap { nodes, .. } => nodes[index] = node,
            NodeStore::Mmap(store) => store.set(index, node),
        }
    }

    /// Splices out the node at `index` and returns it. Later nodes shift
    /// down by one.
    pub(crate) fn remove(&mut self, index: usize) -> SubtreeNode {
        match self {
            NodeStore::Heap { nodes, .. } => nodes.remove(index),
            NodeStore::Mmap(store) => store.remove(index),
        }
    }

    /// Releases backing resources. No-op for the heap backing; unmaps and
    /// deletes the file for mmap, exactly once.
    pub(crate) fn close(&mut self) {
        if let NodeStore::Mmap(store) = self {
            store.close();
        }
    }
}
