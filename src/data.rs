//! Transaction payloads bound to a subtree.
//!
//! [`SubtreeData`] is the parallel array to a subtree's leaves: slot `i`
//! holds the full transaction whose id is `nodes[i].hash`, or nothing for
//! the coinbase placeholder slot. The transaction wire format itself is
//! external; the store only assumes the small [`SubtreeTx`] contract and
//! verifies ids against the leaves as payloads stream in.

use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::sync::Arc;

use crate::def::{COINBASE_PLACEHOLDER, DECODE_BUFFER_SIZE};
use crate::error::SubtreeError;
use crate::subtree::Subtree;
use crate::utils::hasher::TxHash;

/// The contract the payload store needs from a transaction type.
pub trait SubtreeTx: Sized {
    /// Full wire encoding of the transaction.
    fn serialize_bytes(&self) -> Vec<u8>;

    /// Decodes one transaction from the reader. `Ok(None)` signals a clean
    /// end of stream (no bytes left before the first byte of a
    /// transaction); anything shorter than a whole transaction is an error.
    fn read_from<R: BufRead>(reader: &mut R) -> io::Result<Option<Self>>;

    /// The transaction id, matching the subtree leaf hash.
    fn hash_id(&self) -> TxHash;

    /// True for coinbase transactions, which may occupy a placeholder slot
    /// without id verification.
    fn is_coinbase(&self) -> bool;
}

/// Full-transaction storage for one subtree. `txs[i]` parallels `nodes[i]`.
pub struct SubtreeData<T> {
    pub subtree: Arc<Subtree>,
    pub txs: Vec<Option<T>>,
}

impl<T: SubtreeTx> SubtreeData<T> {
    /// Binds an empty payload array to the subtree, one slot per leaf.
    pub fn new(subtree: Arc<Subtree>) -> SubtreeData<T> {
        let len = subtree.len();
        SubtreeData {
            subtree,
            txs: (0..len).map(|_| None).collect(),
        }
    }

    /// Decodes a payload stream for `subtree` from a byte slice.
    pub fn from_bytes(subtree: Arc<Subtree>, bytes: &[u8]) -> Result<SubtreeData<T>, SubtreeError> {
        Self::from_reader(subtree, Cursor::new(bytes))
    }

    /// Decodes a payload stream for `subtree`. Transactions are rebound in
    /// order to the non-coinbase slots and verified against the leaf ids. A
    /// leading coinbase transaction fills the placeholder slot unverified.
    pub fn from_reader<R: Read>(
        subtree: Arc<Subtree>,
        reader: R,
    ) -> Result<SubtreeData<T>, SubtreeError> {
        let mut data = SubtreeData::new(subtree);
        if data.txs.is_empty() {
            return Err(SubtreeError::EmptyNodes);
        }

        let len = data.txs.len();
        let start = data.tx_start_index();
        let mut tx_index = start;
        let mut buf = BufReader::with_capacity(DECODE_BUFFER_SIZE, reader);

        loop {
            let tx = match T::read_from(&mut buf) {
                Ok(Some(tx)) => tx,
                Ok(None) => break,
                Err(e) => return Err(SubtreeError::decode("transaction", e)),
            };

            // The coinbase may arrive first in the stream even though the
            // subtree only carries its placeholder; store it unverified.
            if start == 1 && tx_index == 1 && tx.is_coinbase() && data.txs[0].is_none() {
                data.txs[0] = Some(tx);
                continue;
            }

            if tx_index >= len {
                return Err(SubtreeError::IndexOutOfRange {
                    index: tx_index,
                    len,
                });
            }
            if data.subtree.node_at(tx_index).map(|n| n.hash) != Some(tx.hash_id()) {
                return Err(SubtreeError::TxHashMismatch);
            }

            data.txs[tx_index] = Some(tx);
            tx_index += 1;
        }

        Ok(data)
    }

    /// Root hash of the bound subtree.
    pub fn root_hash(&self) -> Option<TxHash> {
        self.subtree.root_hash()
    }

    /// First slot that carries a real payload: 1 when leaf 0 is the
    /// coinbase placeholder, 0 otherwise.
    fn tx_start_index(&self) -> usize {
        match self.subtree.node_at(0) {
            Some(node) if node.hash == COINBASE_PLACEHOLDER => 1,
            _ => 0,
        }
    }

    /// Stores `tx` at `index` after verifying its id against the leaf. A
    /// coinbase transaction may take index 0 when the leaf there is the
    /// placeholder; its id is not checked against the sentinel.
    pub fn add_tx(&mut self, tx: T, index: usize) -> Result<(), SubtreeError> {
        let node = self
            .subtree
            .node_at(index)
            .filter(|_| index < self.txs.len())
            .ok_or(SubtreeError::IndexOutOfRange {
                index,
                len: self.txs.len(),
            })?;

        if index == 0 && tx.is_coinbase() && node.hash == COINBASE_PLACEHOLDER {
            self.txs[0] = Some(tx);
            return Ok(());
        }

        if node.hash != tx.hash_id() {
            return Err(SubtreeError::TxHashMismatch);
        }

        self.txs[index] = Some(tx);
        Ok(())
    }

    /// Serializes every payload from the start index on, concatenated in
    /// leaf order. The coinbase slot is never emitted. Any empty slot at or
    /// after the start index fails the whole serialisation.
    pub fn serialize(&self) -> Result<Vec<u8>, SubtreeError> {
        let start = self.tx_start_index();

        let mut buf = Vec::with_capacity(32 * 1024);
        for (i, slot) in self.txs.iter().enumerate().skip(start) {
            let tx = slot.as_ref().ok_or(SubtreeError::MissingTx(i))?;
            buf.extend_from_slice(&tx.serialize_bytes());
        }

        Ok(buf)
    }

    /// Streams the payloads in `[start, end)` to a writer, skipping the
    /// coinbase placeholder slot. Lets callers serialize a large subtree in
    /// chunks without holding every encoding in memory at once.
    pub fn write_range<W: Write>(
        &self,
        writer: &mut W,
        start: usize,
        end: usize,
    ) -> Result<(), SubtreeError> {
        for i in start..end {
            if i == 0 && self.tx_start_index() == 1 {
                continue;
            }

            let tx = self
                .txs
                .get(i)
                .and_then(Option::as_ref)
                .ok_or(SubtreeError::MissingTx(i))?;

            writer
                .write_all(&tx.serialize_bytes())
                .map_err(|e| SubtreeError::Write { index: i, source: e })?;
        }

        Ok(())
    }

    /// Reads payloads for the slots in `[start, end)` from a reader,
    /// verifying each against its leaf id. A clean end of stream stops
    /// early without error; the number of transactions read is returned.
    ///
    /// The reader is taken as `BufRead` so consecutive range reads over one
    /// stream do not lose buffered bytes between calls.
    pub fn read_range<R: BufRead>(
        &mut self,
        reader: &mut R,
        start: usize,
        end: usize,
    ) -> Result<usize, SubtreeError> {
        if self.txs.is_empty() {
            return Err(SubtreeError::EmptyNodes);
        }

        let mut txs_read = 0;
        for i in start..end.min(self.txs.len()) {
            if i == 0 && self.tx_start_index() == 1 {
                continue;
            }

            let tx = match T::read_from(reader) {
                Ok(Some(tx)) => tx,
                Ok(None) => break,
                Err(e) => return Err(SubtreeError::decode("transaction", e)),
            };

            if self.subtree.node_at(i).map(|n| n.hash) != Some(tx.hash_id()) {
                return Err(SubtreeError::TxHashMismatch);
            }

            self.txs[i] = Some(tx);
            txs_read += 1;
        }

        Ok(txs_read)
    }
}
