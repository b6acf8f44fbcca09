//! Crate-wide constants and the coinbase-placeholder rules.

use crate::utils::hasher::TxHash;

/// Sentinel leaf hash reserving index 0 of a subtree for a coinbase
/// transaction that is bound later. Hard-coded so the compiler can fold
/// comparisons against it.
pub const COINBASE_PLACEHOLDER: TxHash = TxHash([0xFF; 32]);

/// Version field of a coinbase placeholder transaction.
pub const PLACEHOLDER_TX_VERSION: u32 = 0xFFFF_FFFF;

/// Lock-time field of a coinbase placeholder transaction.
pub const PLACEHOLDER_TX_LOCK_TIME: u32 = 0xFFFF_FFFF;

/// Leaf count at and above which the merkle builder hashes each layer with
/// parallel workers. Below it a single thread is faster than the fork/join
/// overhead. Tunable, not part of the wire contract.
pub const PARALLEL_HASH_MIN_LEAVES: usize = 1024;

/// Read-ahead used by the streaming decoders. Subtrees serialize to tens of
/// megabytes at production heights, so the decoders buffer aggressively.
pub const DECODE_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// File-name prefix of the temporary files backing mmap node stores.
pub const MMAP_FILE_PREFIX: &str = "subtree-nodes-";

/// Returns true when a transaction's version and lock-time mark it as a
/// coinbase placeholder rather than a real transaction.
pub fn is_placeholder_tx_fields(version: u32, lock_time: u32) -> bool {
    version == PLACEHOLDER_TX_VERSION && lock_time == PLACEHOLDER_TX_LOCK_TIME
}
