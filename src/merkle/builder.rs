//! Flattened merkle parent-array construction.
//!
//! The builder turns a slice of leaves into the internal nodes of the merkle
//! tree, laid out layer by layer from just above the leaves up to the root,
//! with the leaves themselves excluded. An incomplete tree is padded to the
//! next power of two: a missing right sibling duplicates the left child
//! (`hash256(L||L)`, the Bitcoin odd-row rule), and a slot whose children are
//! both absent stays the zero hash, propagating emptiness up the layers so
//! proof generation can recognise and skip it.

use std::thread;

use crate::def::PARALLEL_HASH_MIN_LEAVES;
use crate::error::SubtreeError;
use crate::store::SubtreeNode;
use crate::utils::hasher::{hash256_pair, TxHash, ZERO_HASH};
use crate::utils::pow2::ceil_power_of_two;

/// Smallest number of parent slots a worker chunk is worth spawning for.
const MIN_PARALLEL_SLOTS: usize = 256;

/// Builds the flattened merkle store for `nodes`.
///
/// Layout: for `n` leaves rounded up to `N = ceil_power_of_two(n)`, the
/// result holds `N - 1` hashes; the first `N / 2` are the layer directly
/// above the leaves, the next `N / 4` the layer above that, and so on. The
/// final element is the merkle root.
///
/// Special cases: an empty slice yields an empty store, and a single leaf
/// yields a one-element store containing the leaf hash itself.
///
/// For `PARALLEL_HASH_MIN_LEAVES` or more leaves every layer is hashed by
/// parallel workers over contiguous ranges; the output is identical to the
/// sequential path.
pub fn build_merkle_tree_store(nodes: &[SubtreeNode]) -> Result<Vec<TxHash>, SubtreeError> {
    let n = nodes.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    if n == 1 {
        return Ok(vec![nodes[0].hash]);
    }

    let width = ceil_power_of_two(n as i64) as usize;
    let parallel = n >= PARALLEL_HASH_MIN_LEAVES;
    let mut store = vec![ZERO_HASH; width - 1];

    // Layer 0 pairs leaves; slots past the last leaf stay zero.
    {
        let (layer, _) = store.split_at_mut(width / 2);
        fill_slots(layer, parallel, |j| {
            let left = 2 * j;
            let right = left + 1;
            if right < n {
                hash256_pair(&nodes[left].hash, &nodes[right].hash)
            } else if left < n {
                hash256_pair(&nodes[left].hash, &nodes[left].hash)
            } else {
                ZERO_HASH
            }
        });
    }

    // Each upper layer pairs the layer below it.
    let mut offset = 0;
    let mut layer_width = width / 2;
    while layer_width > 1 {
        let (lower, upper) = store.split_at_mut(offset + layer_width);
        let prev = &lower[offset..];
        let layer = &mut upper[..layer_width / 2];
        fill_slots(layer, parallel, |j| combine(&prev[2 * j], &prev[2 * j + 1]));
        offset += layer_width;
        layer_width /= 2;
    }

    if store.last().map_or(true, TxHash::is_zero) {
        return Err(SubtreeError::Build(format!(
            "zero root for {} leaves",
            n
        )));
    }

    Ok(store)
}

/// Merkle parent of two sibling slots, observing the empty-slot rules.
fn combine(left: &TxHash, right: &TxHash) -> TxHash {
    if left.is_zero() && right.is_zero() {
        ZERO_HASH
    } else if right.is_zero() {
        hash256_pair(left, left)
    } else {
        hash256_pair(left, right)
    }
}

/// Fills every slot of a layer with `slot_fn(index)`, splitting the layer
/// into contiguous per-worker ranges when the parallel path is enabled.
/// Ranges are independent, so scheduling order cannot affect the output.
fn fill_slots<F>(layer: &mut [TxHash], parallel: bool, slot_fn: F)
where
    F: Fn(usize) -> TxHash + Sync,
{
    let workers = if parallel {
        thread::available_parallelism().map_or(1, usize::from)
    } else {
        1
    };
    let chunk = layer.len().div_ceil(workers).max(MIN_PARALLEL_SLOTS);

    if chunk >= layer.len() {
        for (j, slot) in layer.iter_mut().enumerate() {
            *slot = slot_fn(j);
        }
        return;
    }

    thread::scope(|scope| {
        for (chunk_idx, out) in layer.chunks_mut(chunk).enumerate() {
            let slot_fn = &slot_fn;
            scope.spawn(move || {
                let base = chunk_idx * chunk;
                for (j, slot) in out.iter_mut().enumerate() {
                    *slot = slot_fn(base + j);
                }
            });
        }
    });
}
