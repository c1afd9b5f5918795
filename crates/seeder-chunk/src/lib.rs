//! Chunked payload storage.
//!
//! - [`tree`] -- splits payloads into bounded chunks and builds proof paths
//! - [`OffsetLedger`] -- assigns each distinct `(data_root, size)` a range in
//!   one global address space
//! - [`ChunkStore`] -- persists chunks by absolute offset and reassembles payloads

pub mod error;
pub mod ledger;
pub mod store;
pub mod tree;

pub use error::{ChunkError, ChunkResult};
pub use ledger::{entry_key, OffsetLedger};
pub use store::{chunk_start_offset, ChunkStore};
pub use tree::{chunk_ranges, validate_path, ChunkRange, ChunkTree, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
