//! Merkle proof extraction.
//!
//! Proofs walk the flattened parent array from a leaf to the root, emitting
//! one sibling per layer. In an incomplete tree some sibling slots hold the
//! zero hash (no real subtree below them); the walk never emits those.
//! Instead it checks the adjacent slot only - if the natural sibling is zero
//! the current slot itself is emitted. This adjacency-level rule is part of
//! the proof format for incomplete trees; widening it to a general search
//! would change the emitted paths.

use crate::error::SubtreeError;
use crate::merkle::builder::build_merkle_tree_store;
use crate::store::SubtreeNode;
use crate::subtree::Subtree;
use crate::utils::hasher::TxHash;
use crate::utils::pow2::ceil_power_of_two;

/// Sibling path for `nodes[index]`, bottom-up. The path length equals
/// `log2(ceil_power_of_two(len))`; a single-leaf tree has an empty path.
pub(crate) fn merkle_proof_for_index(
    nodes: &[SubtreeNode],
    index: usize,
) -> Result<Vec<TxHash>, SubtreeError> {
    let len = nodes.len();
    if index >= len {
        return Err(SubtreeError::IndexOutOfRange { index, len });
    }

    let store = build_merkle_tree_store(nodes)?;
    let height = ceil_power_of_two(len as i64).trailing_zeros() as usize;
    let total_length = (1usize << height) + store.len();

    let mut proof = Vec::with_capacity(height);
    let mut layer_base = 0usize;
    let mut tree_index = index;

    for level in (1..=height).rev() {
        if level == height {
            // Leaf layer: the sibling comes straight from the node slice. A
            // dangling last leaf in an odd row has no sibling; such indices
            // are outside the supported proof surface.
            let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
            let node = nodes
                .get(sibling)
                .ok_or(SubtreeError::IndexOutOfRange { index: sibling, len })?;
            proof.push(node.hash);
        } else {
            let mut pos = layer_base + tree_index;
            if pos % 2 == 0 {
                if total_length > pos + 1 && !store[pos + 1].is_zero() {
                    pos += 1;
                }
            } else if !store[pos - 1].is_zero() {
                pos -= 1;
            }
            proof.push(store[pos]);
            layer_base += 1 << level;
        }
        tree_index /= 2;
    }

    Ok(proof)
}

/// Builds the merkle proof for a coinbase transaction across a chain of
/// already-built subtrees: the sibling path for leaf 0 of the first subtree,
/// extended with each following subtree's root as the sibling at the next
/// layer of the top tree.
pub fn merkle_proof_for_coinbase<S: AsRef<Subtree>>(
    subtrees: &[S],
) -> Result<Vec<TxHash>, SubtreeError> {
    let (first, rest) = subtrees.split_first().ok_or(SubtreeError::NoSubtrees)?;

    let mut proof = first.as_ref().merkle_proof(0)?;
    for subtree in rest {
        proof.push(subtree.as_ref().root_hash().ok_or(SubtreeError::EmptyNodes)?);
    }

    Ok(proof)
}
