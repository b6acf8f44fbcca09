//! Hashing utilities and the transaction-hash type.
//!
//! This module provides the 32-byte hash value used for leaf identifiers and
//! merkle nodes, plus the SHA-256 based combiners:
//! - Single SHA-256 for arbitrary data
//! - Double SHA-256 (`hash256`) as used for transaction ids
//! - Pairwise double SHA-256 for merkle parent nodes

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// A 32-byte hash, compared by byte equality.
///
/// The in-memory byte order is the internal (little-endian) order used on the
/// wire and fed to the hash function. `Display` and `FromStr` use the
/// reversed hex convention of transaction ids, so hashes round-trip through
/// the familiar explorer notation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct TxHash(pub [u8; 32]);

/// The all-zero hash. Marks empty sibling slots in merkle stores.
pub const ZERO_HASH: TxHash = TxHash([0u8; 32]);

impl TxHash {
    /// Byte length of a hash.
    pub const LEN: usize = 32;

    /// The all-zero hash.
    pub const ZERO: TxHash = ZERO_HASH;

    /// Returns the hash bytes in internal order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parses a hash from reversed-hex (transaction-id) notation.
    pub fn from_hex(s: &str) -> Result<TxHash, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(TxHash(bytes))
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(bytes: [u8; 32]) -> Self {
        TxHash(bytes)
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

// Debug delegates to Display so logs show the txid notation.
impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for TxHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TxHash::from_hex(s)
    }
}

/// Computes the SHA-256 hash of a value.
pub fn sha256<T: AsRef<[u8]>>(data: T) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    TxHash(hasher.finalize().into())
}

/// Computes the double SHA-256 hash of a value, the transaction-id hash.
pub fn hash256<T: AsRef<[u8]>>(data: T) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let first: [u8; 32] = hasher.finalize().into();
    sha256(first)
}

/// Computes the merkle parent of two child hashes: double SHA-256 over the
/// 64-byte concatenation `left || right`.
pub fn hash256_pair(left: &TxHash, right: &TxHash) -> TxHash {
    let mut hasher = Sha256::new();
    hasher.update(left.0);
    hasher.update(right.0);
    let first: [u8; 32] = hasher.finalize().into();
    sha256(first)
}
