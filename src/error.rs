//! Error types surfaced by subtree operations and codecs.

use std::io;

use thiserror::Error;

/// Errors raised by subtree containers, merkle construction and the binary
/// codecs. Every failure surfaces to the caller; nothing is retried
/// internally.
#[derive(Error, Debug)]
pub enum SubtreeError {
    /// The subtree already holds `capacity` nodes.
    #[error("subtree is full")]
    Full,

    /// The coinbase placeholder was inserted through the wrong API, or a
    /// placeholder was requested on a non-empty subtree.
    #[error("coinbase placeholder node must be added with add_coinbase_placeholder on an empty subtree")]
    CoinbasePlaceholder,

    /// An operation that needs leaves was called on an empty subtree.
    #[error("subtree has no nodes")]
    EmptyNodes,

    /// A coinbase merkle proof was requested over an empty subtree list.
    #[error("no subtrees available")]
    NoSubtrees,

    /// An index fell outside the populated node range.
    #[error("index {index} out of range for {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },

    /// A transaction payload hashed to something other than its leaf.
    #[error("transaction hash does not match the subtree node hash")]
    TxHashMismatch,

    /// `add_conflicting_node` was given a hash the subtree does not contain.
    #[error("conflicting node is not in the subtree")]
    NotInSubtree,

    /// A non-coinbase payload slot was empty at serialisation time.
    #[error("transaction at index {0} is missing, cannot serialize")]
    MissingTx(usize),

    /// Streaming a transaction payload to a writer failed.
    #[error("error writing transaction at index {index}: {source}")]
    Write {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// The parent-hash list and the per-parent index lists disagree.
    #[error("parent tx hashes and index lists have different lengths")]
    InpointsMismatch,

    /// A decoder hit a short read or corrupt structure.
    #[error("unable to read {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Creating or mapping the file behind an mmap node store failed.
    #[error("mmap node store creation failed: {0}")]
    MmapCreate(#[source] io::Error),

    /// A constructor was given a capacity that is non-positive, too large,
    /// or not a power of two where one is required.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(i64),

    /// The merkle builder detected an internally inconsistent store. Should
    /// be unreachable for well-formed input.
    #[error("merkle tree build failed: {0}")]
    Build(String),
}

impl SubtreeError {
    /// Wraps an io error with the decode context it occurred in, converting
    /// clean EOF into the unexpected-EOF the codecs treat it as.
    pub(crate) fn decode(context: &'static str, source: io::Error) -> Self {
        SubtreeError::Decode { context, source }
    }
}
