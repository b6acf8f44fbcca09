//! Little-endian read helpers for the binary codecs.
//!
//! Every helper tags short reads with the field being decoded, so codec
//! errors read like "unable to read number of leaves: ..." instead of a bare
//! io error.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::SubtreeError;
use crate::utils::hasher::TxHash;

/// Reads a little-endian u64, tagging failures with `context`.
pub(crate) fn read_u64<R: Read>(reader: &mut R, context: &'static str) -> Result<u64, SubtreeError> {
    reader
        .read_u64::<LittleEndian>()
        .map_err(|e| SubtreeError::decode(context, e))
}

/// Reads a little-endian u32, tagging failures with `context`.
pub(crate) fn read_u32<R: Read>(reader: &mut R, context: &'static str) -> Result<u32, SubtreeError> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| SubtreeError::decode(context, e))
}

/// Reads a 32-byte hash in internal order.
pub(crate) fn read_hash<R: Read>(
    reader: &mut R,
    context: &'static str,
) -> Result<TxHash, SubtreeError> {
    let mut bytes = [0u8; TxHash::LEN];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| SubtreeError::decode(context, e))?;
    Ok(TxHash(bytes))
}

/// Fills `buf` completely, tagging failures with `context`.
pub(crate) fn read_exact<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    context: &'static str,
) -> Result<(), SubtreeError> {
    reader
        .read_exact(buf)
        .map_err(|e| SubtreeError::decode(context, e))
}

/// Discards exactly `n` bytes from the reader. A short stream is an error:
/// the wire formats are length-self-describing, so running out of bytes in a
/// skip means the input is truncated.
pub(crate) fn skip<R: Read>(
    reader: &mut R,
    n: u64,
    context: &'static str,
) -> Result<(), SubtreeError> {
    let copied = io::copy(&mut reader.by_ref().take(n), &mut io::sink())
        .map_err(|e| SubtreeError::decode(context, e))?;
    if copied != n {
        return Err(SubtreeError::decode(
            context,
            io::Error::from(io::ErrorKind::UnexpectedEof),
        ));
    }
    Ok(())
}
