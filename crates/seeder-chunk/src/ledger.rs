use std::sync::Arc;

use seeder_store::{keys, BatchOp, Bucket, KeyValueStore, StoreError};
use seeder_types::parse_size;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ChunkError, ChunkResult};

/// Assigns every distinct `(data_root, size)` pair an exclusive end offset
/// in one global, append-only address space.
///
/// The global counter and the per-payload entry are written in a single
/// store batch under the offset lock, so a crash never leaves one without
/// the other. The lock covers nothing else.
pub struct OffsetLedger {
    store: Arc<dyn KeyValueStore>,
    offset_lock: Mutex<()>,
}

impl OffsetLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            offset_lock: Mutex::new(()),
        }
    }

    /// Return the end offset for `(root, size)`, assigning one if needed.
    ///
    /// Idempotent: an existing entry is returned untouched and the global
    /// total is not advanced again.
    pub async fn ensure_offset(&self, root: &str, size: &str) -> ChunkResult<u64> {
        let size = parse_size(size)?;
        let key = entry_key(root, size);

        let _guard = self.offset_lock.lock().await;
        match self.store.get(Bucket::TxDataEndOffset, &key).await {
            Ok(raw) => return decode_offset(&key, &raw),
            Err(StoreError::NotExist { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let current = self.read_data_end_offset().await?;
        let end = current
            .checked_add(size)
            .ok_or(ChunkError::OffsetOverflow { current, size })?;
        let encoded = end.to_string().into_bytes();
        self.store
            .write_batch(&[
                BatchOp::put(Bucket::Constants, keys::ALL_DATA_END_OFFSET, encoded.clone()),
                BatchOp::put(Bucket::TxDataEndOffset, key.as_str(), encoded),
            ])
            .await?;
        debug!(root, size, end, "assigned payload offset");
        Ok(end)
    }

    /// End offset of an already assigned payload.
    pub async fn end_offset(&self, root: &str, size: u64) -> ChunkResult<u64> {
        let key = entry_key(root, size);
        let raw = self.store.get(Bucket::TxDataEndOffset, &key).await?;
        decode_offset(&key, &raw)
    }

    /// Sum of all distinct payload sizes admitted so far.
    pub async fn data_end_offset(&self) -> ChunkResult<u64> {
        let _guard = self.offset_lock.lock().await;
        self.read_data_end_offset().await
    }

    async fn read_data_end_offset(&self) -> ChunkResult<u64> {
        match self.store.get(Bucket::Constants, keys::ALL_DATA_END_OFFSET).await {
            Ok(raw) => decode_offset(keys::ALL_DATA_END_OFFSET, &raw),
            Err(StoreError::NotExist { .. }) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Key of a payload's entry in the `tx-data-end-offset` bucket.
pub fn entry_key(root: &str, size: u64) -> String {
    format!("{root}-{size}")
}

fn decode_offset(key: &str, raw: &[u8]) -> ChunkResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ChunkError::Corrupt {
            key: key.to_string(),
            reason: "offset is not a decimal integer".into(),
        })
}
