//! Binary serialisation of subtrees.
//!
//! Wire layout, little-endian throughout, no framing or version byte (the
//! format is length-self-describing):
//!
//! ```text
//! root hash            32 bytes
//! fees                 u64
//! size in bytes        u64
//! number of nodes      u64
//! per node:            hash (32) | fee (u64) | size (u64)
//! number of conflicting u64
//! per conflicting:     hash (32)
//! ```
//!
//! Besides the full decoder there are two partial decoders for callers that
//! only need the leaf ids or the conflicting list; both skip over the parts
//! they do not care about without materialising node records.

use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::def::DECODE_BUFFER_SIZE;
use crate::error::SubtreeError;
use crate::store::{NodeStore, SubtreeNode, NODE_SIZE};
use crate::subtree::Subtree;
use crate::utils::codec::{read_exact, read_hash, read_u64, skip};
use crate::utils::hasher::TxHash;
use crate::utils::pow2::ceil_power_of_two;

impl Subtree {
    /// Serializes the subtree. The root hash is computed (and cached) if
    /// needed; serializing an empty subtree is an error.
    pub fn serialize(&self) -> Result<Vec<u8>, SubtreeError> {
        let root = self.root_hash_checked()?;
        let state = self.state.read();
        let nodes = state.nodes.as_slice();

        let mut buf = Vec::with_capacity(
            TxHash::LEN + 24 + nodes.len() * NODE_SIZE + 8 + state.conflicting.len() * TxHash::LEN,
        );

        buf.extend_from_slice(root.as_bytes());
        buf.extend_from_slice(&state.fees.to_le_bytes());
        buf.extend_from_slice(&state.size_in_bytes.to_le_bytes());
        buf.extend_from_slice(&(nodes.len() as u64).to_le_bytes());

        for node in nodes {
            buf.extend_from_slice(node.hash.as_bytes());
            buf.extend_from_slice(&node.fee.to_le_bytes());
            buf.extend_from_slice(&node.size_in_bytes.to_le_bytes());
        }

        buf.extend_from_slice(&(state.conflicting.len() as u64).to_le_bytes());
        for hash in &state.conflicting {
            buf.extend_from_slice(hash.as_bytes());
        }

        Ok(buf)
    }

    /// Serializes only the leaf ids as packed 32-byte hashes, without the
    /// root, aggregates or conflicting list.
    pub fn serialize_nodes(&self) -> Result<Vec<u8>, SubtreeError> {
        let state = self.state.read();
        let nodes = state.nodes.as_slice();
        let mut buf = Vec::with_capacity(nodes.len() * TxHash::LEN);
        for node in nodes {
            buf.extend_from_slice(node.hash.as_bytes());
        }
        Ok(buf)
    }

    /// Rebuilds a heap-backed subtree from its serialized form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Subtree, SubtreeError> {
        decode_subtree(Cursor::new(bytes), None)
    }

    /// Rebuilds a heap-backed subtree from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Subtree, SubtreeError> {
        decode_subtree(reader, None)
    }

    /// Rebuilds a subtree from a reader, placing the leaves in an
    /// mmap-backed store under `dir`.
    pub fn from_reader_mmap<R: Read>(
        reader: R,
        dir: impl AsRef<Path>,
    ) -> Result<Subtree, SubtreeError> {
        decode_subtree(reader, Some(dir.as_ref()))
    }
}

fn decode_subtree<R: Read>(reader: R, mmap_dir: Option<&Path>) -> Result<Subtree, SubtreeError> {
    let mut buf = BufReader::with_capacity(DECODE_BUFFER_SIZE, reader);

    let root = read_hash(&mut buf, "root hash")?;
    let fees = read_u64(&mut buf, "fees")?;
    let size_in_bytes = read_u64(&mut buf, "size in bytes")?;

    let num_nodes = read_u64(&mut buf, "number of leaves")?;
    if num_nodes == 0 {
        return Err(SubtreeError::EmptyNodes);
    }
    let num_nodes = usize::try_from(num_nodes).map_err(|_| SubtreeError::InvalidCapacity(i64::MAX))?;

    // Capacity is inferred from the wire count; the power-of-two rule of
    // in-memory construction is intentionally relaxed on the decode side.
    let height = ceil_power_of_two(num_nodes as i64).trailing_zeros() as usize;
    let mut nodes = match mmap_dir {
        Some(dir) => NodeStore::mmap(num_nodes, dir)?,
        None => NodeStore::heap(num_nodes),
    };

    let mut record = [0u8; NODE_SIZE];
    for _ in 0..num_nodes {
        read_exact(&mut buf, &mut record, "node")?;
        let mut hash = [0u8; TxHash::LEN];
        hash.copy_from_slice(&record[..TxHash::LEN]);
        nodes.push(SubtreeNode {
            hash: TxHash(hash),
            fee: LittleEndian::read_u64(&record[32..40]),
            size_in_bytes: LittleEndian::read_u64(&record[40..48]),
        });
    }

    let num_conflicting = read_u64(&mut buf, "number of conflicting nodes")?;
    let mut conflicting = Vec::with_capacity(num_conflicting.min(1024) as usize);
    for _ in 0..num_conflicting {
        conflicting.push(read_hash(&mut buf, "conflicting node")?);
    }

    Ok(Subtree::from_wire(
        height,
        nodes,
        fees,
        size_in_bytes,
        conflicting,
        root,
    ))
}

/// Reads only the leaf ids out of a serialized subtree, returning them as a
/// packed `32 * num_nodes` byte buffer. Skips the per-node fee and size
/// fields without decoding them.
pub fn deserialize_nodes_from_reader<R: Read>(reader: R) -> Result<Vec<u8>, SubtreeError> {
    let mut buf = BufReader::with_capacity(DECODE_BUFFER_SIZE, reader);

    // root (32) + fees (8) + size (8) + leaf count (8) in one read
    let mut header = [0u8; TxHash::LEN + 24];
    read_exact(&mut buf, &mut header, "subtree root information")?;
    let num_leaves = LittleEndian::read_u64(&header[TxHash::LEN + 16..]);

    let out_len = usize::try_from(num_leaves)
        .ok()
        .and_then(|n| n.checked_mul(TxHash::LEN))
        .ok_or(SubtreeError::InvalidCapacity(i64::MAX))?;
    let mut out = vec![0u8; out_len];

    let mut record = [0u8; NODE_SIZE];
    for i in 0..num_leaves as usize {
        read_exact(&mut buf, &mut record, "subtree node information")?;
        out[i * TxHash::LEN..(i + 1) * TxHash::LEN].copy_from_slice(&record[..TxHash::LEN]);
    }

    Ok(out)
}

/// Reads only the conflicting-node list out of a serialized subtree,
/// skipping straight past the header and node records.
pub fn deserialize_conflicting_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<TxHash>, SubtreeError> {
    let mut buf = BufReader::with_capacity(DECODE_BUFFER_SIZE, reader);

    skip(&mut buf, (TxHash::LEN + 16) as u64, "subtree header")?;
    let num_leaves = read_u64(&mut buf, "number of leaves")?;
    let skip_len = num_leaves
        .checked_mul(NODE_SIZE as u64)
        .ok_or(SubtreeError::InvalidCapacity(i64::MAX))?;
    skip(&mut buf, skip_len, "nodes")?;

    let num_conflicting = read_u64(&mut buf, "number of conflicting nodes")?;
    let mut conflicting = Vec::with_capacity(num_conflicting.min(1024) as usize);
    for _ in 0..num_conflicting {
        conflicting.push(read_hash(&mut buf, "conflicting node")?);
    }

    Ok(conflicting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hasher::sha256;

    fn populated_subtree() -> Subtree {
        let st = Subtree::new(2).unwrap();
        for (i, tag) in ["tx1", "tx2", "tx3", "tx4"].iter().enumerate() {
            st.add_node(sha256(tag.as_bytes()), 111 + i as u64, 10 * i as u64)
                .unwrap();
        }
        st
    }

    #[test]
    fn test_round_trip() {
        let st = populated_subtree();
        let bytes = st.serialize().unwrap();
        assert_eq!(bytes.len(), 32 + 24 + 4 * NODE_SIZE + 8);

        let decoded = Subtree::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.fees(), st.fees());
        assert_eq!(decoded.size_in_bytes(), st.size_in_bytes());
        assert_eq!(decoded.capacity(), st.capacity());
        assert_eq!(decoded.root_hash(), st.root_hash());
        assert_eq!(decoded.nodes(), st.nodes());

        // re-serialisation is byte identical
        assert_eq!(decoded.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_round_trip_with_conflicting() {
        let st = populated_subtree();
        st.add_conflicting_node(sha256(b"tx3")).unwrap();
        st.add_conflicting_node(sha256(b"tx4")).unwrap();

        let bytes = st.serialize().unwrap();
        assert_eq!(bytes.len(), 32 + 24 + 4 * NODE_SIZE + 8 + 2 * 32);

        let decoded = Subtree::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.conflicting_nodes(), st.conflicting_nodes());
        assert_eq!(decoded.root_hash(), st.root_hash());
        assert_eq!(decoded.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_wire_layout() {
        let st = populated_subtree();
        let bytes = st.serialize().unwrap();

        assert_eq!(&bytes[..32], st.root_hash().unwrap().as_bytes());
        assert_eq!(LittleEndian::read_u64(&bytes[32..40]), st.fees());
        assert_eq!(LittleEndian::read_u64(&bytes[40..48]), st.size_in_bytes());
        assert_eq!(LittleEndian::read_u64(&bytes[48..56]), 4);
        assert_eq!(&bytes[56..88], sha256(b"tx1").as_bytes());
        assert_eq!(LittleEndian::read_u64(&bytes[88..96]), 111);
        // trailing conflicting count
        assert_eq!(LittleEndian::read_u64(&bytes[bytes.len() - 8..]), 0);
    }

    #[test]
    fn test_nodes_only_decoder() {
        let st = populated_subtree();
        let bytes = st.serialize().unwrap();

        let packed = deserialize_nodes_from_reader(Cursor::new(&bytes)).unwrap();
        assert_eq!(packed.len(), 4 * 32);
        for (i, node) in st.nodes().iter().enumerate() {
            assert_eq!(&packed[i * 32..(i + 1) * 32], node.hash.as_bytes());
        }
    }

    #[test]
    fn test_conflicting_only_decoder() {
        let st = populated_subtree();
        st.add_conflicting_node(sha256(b"tx2")).unwrap();
        let bytes = st.serialize().unwrap();

        let conflicting = deserialize_conflicting_from_reader(Cursor::new(&bytes)).unwrap();
        assert_eq!(conflicting, vec![sha256(b"tx2")]);
    }

    #[test]
    fn test_empty_subtree_does_not_serialize() {
        let st = Subtree::new(2).unwrap();
        assert!(matches!(st.serialize(), Err(SubtreeError::EmptyNodes)));
    }

    #[test]
    fn test_truncated_input() {
        let st = populated_subtree();
        let bytes = st.serialize().unwrap();

        for cut in [0, 10, 55, 60, bytes.len() - 1] {
            let err = Subtree::from_bytes(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, SubtreeError::Decode { .. }),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn test_partial_decoders_reject_truncation() {
        let st = populated_subtree();
        st.add_conflicting_node(sha256(b"tx1")).unwrap();
        let bytes = st.serialize().unwrap();

        assert!(deserialize_nodes_from_reader(Cursor::new(&bytes[..70])).is_err());
        assert!(deserialize_conflicting_from_reader(Cursor::new(&bytes[..bytes.len() - 1])).is_err());
    }

    #[test]
    fn test_serialize_nodes() {
        let st = populated_subtree();
        let packed = st.serialize_nodes().unwrap();
        assert_eq!(packed.len(), 4 * 32);
        assert_eq!(&packed[..32], sha256(b"tx1").as_bytes());
        assert_eq!(&packed[96..], sha256(b"tx4").as_bytes());
    }
}
