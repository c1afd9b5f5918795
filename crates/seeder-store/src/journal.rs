//! Framing for the object-storage batch journal.
//!
//! On-store format:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized Vec<BatchOp>)]
//! ```

use crate::error::{StoreError, StoreResult};
use crate::traits::BatchOp;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

pub(crate) fn encode(ops: &[BatchOp]) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(ops).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization("batch journal too large".into()))?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(data: &[u8]) -> StoreResult<Vec<BatchOp>> {
    if data.len() < HEADER_SIZE {
        return Err(StoreError::CorruptJournal(format!(
            "too short: {} bytes",
            data.len()
        )));
    }
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let expected_crc = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let payload = &data[HEADER_SIZE..];
    if payload.len() != length {
        return Err(StoreError::CorruptJournal(format!(
            "length mismatch: header {length}, actual {}",
            payload.len()
        )));
    }
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(StoreError::CorruptJournal(format!(
            "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| StoreError::CorruptJournal(e.to_string()))
}
