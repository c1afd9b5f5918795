use serde::{Deserialize, Serialize};

use crate::encoding::b64;
use crate::error::{TypeError, TypeResult};
use crate::transaction::parse_size;

/// One contiguous slice of a payload as exchanged with peers and clients.
///
/// `offset` is the chunk's inclusive end offset relative to the start of the
/// payload, as a decimal string. `data_path` is the proof path that ties the
/// chunk to `data_root`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub data_root: String,
    pub data_size: String,
    #[serde(with = "b64")]
    pub data_path: Vec<u8>,
    pub offset: String,
    #[serde(with = "b64")]
    pub chunk: Vec<u8>,
}

impl Chunk {
    /// Declared size of the owning payload.
    pub fn payload_size(&self) -> TypeResult<u64> {
        parse_size(&self.data_size)
    }

    /// Inclusive end offset within the payload.
    pub fn relative_end(&self) -> TypeResult<u64> {
        self.offset
            .trim()
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidOffset(self.offset.clone()))
    }

    /// Start offset within the payload.
    pub fn relative_start(&self) -> TypeResult<u64> {
        let end = self.relative_end()?;
        (end + 1)
            .checked_sub(self.chunk.len() as u64)
            .ok_or_else(|| TypeError::InvalidOffset(self.offset.clone()))
    }
}
