//! Merkle-tree subtrees for block-assembly pipelines.
//!
//! # Overview
//! A subtree is a fixed-capacity, power-of-two-sized block of merkle leaves,
//! each leaf a `(txid, fee, size)` record. Block assembly fills hundreds of
//! these concurrently, computes their roots, proves leaf membership, ships
//! them over the wire and binds full transaction payloads to them. This
//! crate is that core:
//!
//! - [`Subtree`]: the leaf container with running fee/size aggregates, a
//!   conflicting-transaction set, a cached merkle root and a lazy
//!   hash-to-index map
//! - [`merkle::build_merkle_tree_store`]: the flattened parent-array builder
//!   with incomplete-tree padding and parallel layer hashing
//! - [`Subtree::merkle_proof`] and [`merkle::merkle_proof_for_coinbase`]:
//!   sibling paths, including the zero-slot skip for incomplete trees
//! - The binary subtree codec with full and partial decoders
//! - [`SubtreeData`]: full-transaction payloads paralleling a subtree's
//!   leaves, with streaming range IO
//! - [`TxInpoints`]: deduplicated previous-output references and their codec
//! - An off-heap leaf backing: nodes can live in a file-backed mmap region
//!   so hundreds of live subtrees keep a predictable RAM footprint
//!
//! # Concurrency
//! A subtree's mutable state sits behind one reader-writer lock; concurrent
//! readers share it while a producer appends. Producers holding the subtree
//! exclusively can use the `_without_lock` paths, which route through
//! `&mut self` and skip the lock entirely. The merkle builder fans each
//! layer out over worker threads for large trees and always produces the
//! same store regardless of worker count.
//!
//! # Resource model
//! Mmap-backed subtrees own one `subtree-nodes-*` file in a caller-supplied
//! directory and zero file descriptors. [`Subtree::close`] unmaps and
//! deletes the file exactly once; dropping the subtree is a backstop.

pub mod def;
pub mod error;
pub mod merkle;
pub mod store;
pub mod subtree;
pub mod utils;

pub mod data;
pub mod inpoints;
pub mod txmap;

pub use def::{
    is_placeholder_tx_fields, COINBASE_PLACEHOLDER, PLACEHOLDER_TX_LOCK_TIME,
    PLACEHOLDER_TX_VERSION,
};
pub use data::{SubtreeData, SubtreeTx};
pub use error::SubtreeError;
pub use inpoints::{Inpoint, TxInpoints};
pub use merkle::{build_merkle_tree_store, merkle_proof_for_coinbase};
pub use store::{SubtreeNode, NODE_SIZE};
pub use subtree::codec::{deserialize_conflicting_from_reader, deserialize_nodes_from_reader};
pub use subtree::Subtree;
pub use txmap::{HashTxMap, TxMap};
pub use utils::hasher::{hash256, hash256_pair, sha256, TxHash, ZERO_HASH};
