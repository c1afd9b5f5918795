use std::sync::Arc;

use serde::{Deserialize, Serialize};
use seeder_store::{Bucket, KeyValueStore};
use seeder_types::{b64_decode, Chunk, TransactionMeta};
use tracing::{debug, info};

use crate::error::{ChunkError, ChunkResult};
use crate::ledger::OffsetLedger;
use crate::tree::{chunk_hash, validate_path, ChunkTree, Hash, HASH_SIZE, MAX_CHUNK_SIZE};

/// Chunk as persisted in the `chunk` bucket, keyed by absolute start offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ChunkRecord {
    data_root: String,
    data_size: u64,
    data_path: Vec<u8>,
    /// Inclusive end offset within the payload.
    relative_end: u64,
    chunk: Vec<u8>,
}

impl From<ChunkRecord> for Chunk {
    fn from(record: ChunkRecord) -> Self {
        Chunk {
            data_root: record.data_root,
            data_size: record.data_size.to_string(),
            data_path: record.data_path,
            offset: record.relative_end.to_string(),
            chunk: record.chunk,
        }
    }
}

/// Absolute start offset of a chunk.
///
/// A payload with end offset `end` and `size` bytes occupies the addresses
/// `[end - size + 1, end]`; a chunk sits at that base plus its relative start.
pub fn chunk_start_offset(end: u64, size: u64, relative_end: u64, len: u64) -> u64 {
    end - size + 1 + relative_end - len + 1
}

/// Splits payloads into chunks, stores them by absolute offset, and
/// reassembles them.
pub struct ChunkStore {
    store: Arc<dyn KeyValueStore>,
    ledger: Arc<OffsetLedger>,
}

impl ChunkStore {
    pub fn new(store: Arc<dyn KeyValueStore>, ledger: Arc<OffsetLedger>) -> Self {
        Self { store, ledger }
    }

    pub fn ledger(&self) -> &Arc<OffsetLedger> {
        &self.ledger
    }

    /// Chunk `payload`, check it against `meta.data_root`, assign the
    /// payload's offset range and persist every chunk.
    pub async fn split_and_store(&self, meta: &TransactionMeta, payload: &[u8]) -> ChunkResult<()> {
        if payload.is_empty() {
            return Err(ChunkError::NullData);
        }
        let size = meta.size()?;
        if size != payload.len() as u64 {
            return Err(ChunkError::SizeMismatch {
                declared: size,
                actual: payload.len() as u64,
            });
        }

        let tree = ChunkTree::build(payload);
        let chunks = tree.to_chunks(payload);
        for chunk in &chunks {
            if chunk.data_root != meta.data_root {
                return Err(ChunkError::InconsistentRoot {
                    declared: meta.data_root.clone(),
                    computed: chunk.data_root.clone(),
                });
            }
        }

        let end = self.ledger.ensure_offset(&meta.data_root, &meta.data_size).await?;
        for chunk in chunks {
            let relative_end = chunk.relative_end()?;
            let start = chunk_start_offset(end, size, relative_end, chunk.chunk.len() as u64);
            self.put_record(
                start,
                &ChunkRecord {
                    data_root: chunk.data_root,
                    data_size: size,
                    data_path: chunk.data_path,
                    relative_end,
                    chunk: chunk.chunk,
                },
            )
            .await?;
        }
        info!(tx_id = %meta.id, size, end, chunks = tree.chunks().len(), "payload stored");
        Ok(())
    }

    /// Store one chunk received on its own. The payload's offset must already
    /// be assigned. Returns the chunk's absolute start offset.
    pub async fn store_chunk(&self, chunk: &Chunk) -> ChunkResult<u64> {
        let size = chunk.payload_size()?;
        let relative_end = chunk.relative_end()?;
        let root = decode_root(&chunk.data_root)?;

        let validated = validate_path(&root, relative_end, size, &chunk.data_path)?;
        if validated.range.end != relative_end + 1 {
            return Err(ChunkError::InvalidProof(format!(
                "offset {relative_end} is not the last byte of its chunk"
            )));
        }
        if validated.range.len() != chunk.chunk.len() as u64 {
            return Err(ChunkError::InvalidProof(format!(
                "chunk is {} bytes, proof covers {}",
                chunk.chunk.len(),
                validated.range.len()
            )));
        }
        if validated.chunk_hash != chunk_hash(&chunk.chunk) {
            return Err(ChunkError::InvalidProof("chunk bytes do not match proof".into()));
        }

        let end = self.ledger.end_offset(&chunk.data_root, size).await?;
        let start = chunk_start_offset(end, size, relative_end, chunk.chunk.len() as u64);
        self.put_record(
            start,
            &ChunkRecord {
                data_root: chunk.data_root.clone(),
                data_size: size,
                data_path: chunk.data_path.clone(),
                relative_end,
                chunk: chunk.chunk.clone(),
            },
        )
        .await?;
        debug!(offset = start, root = %chunk.data_root, "chunk stored");
        Ok(start)
    }

    /// Reassemble a payload. Fails with `NotExist` if the payload has no
    /// offset or any of its chunks is missing.
    pub async fn load_payload(&self, root: &str, size: u64) -> ChunkResult<Vec<u8>> {
        let end = self.ledger.end_offset(root, size).await?;
        let first = end - size + 1;
        let stop = end + 1;

        // The declared size is untrusted until every chunk has been read.
        let mut payload = Vec::with_capacity(size.min(MAX_CHUNK_SIZE as u64) as usize);
        let mut pos = first;
        while pos < stop {
            let record = self.get_record(pos).await?;
            if record.chunk.is_empty() {
                return Err(ChunkError::Corrupt {
                    key: pos.to_string(),
                    reason: "empty chunk".into(),
                });
            }
            pos += record.chunk.len() as u64;
            payload.extend_from_slice(&record.chunk);
        }
        if pos != stop {
            return Err(ChunkError::Corrupt {
                key: root.to_string(),
                reason: format!("chunks overrun payload end by {} bytes", pos - stop),
            });
        }
        Ok(payload)
    }

    /// Chunk stored at an absolute start offset.
    pub async fn get_chunk(&self, offset: u64) -> ChunkResult<Chunk> {
        Ok(self.get_record(offset).await?.into())
    }

    /// Whether every chunk of the payload is present.
    pub async fn has_payload(&self, root: &str, size: u64) -> ChunkResult<bool> {
        match self.load_payload(root, size).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_exist() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn put_record(&self, start: u64, record: &ChunkRecord) -> ChunkResult<()> {
        let encoded = bincode::serialize(record).map_err(|e| ChunkError::Corrupt {
            key: start.to_string(),
            reason: e.to_string(),
        })?;
        self.store.put(Bucket::Chunk, &start.to_string(), &encoded).await?;
        Ok(())
    }

    async fn get_record(&self, start: u64) -> ChunkResult<ChunkRecord> {
        let key = start.to_string();
        let raw = self.store.get(Bucket::Chunk, &key).await?;
        bincode::deserialize(&raw).map_err(|e| ChunkError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }
}

fn decode_root(data_root: &str) -> ChunkResult<Hash> {
    let bytes = b64_decode(data_root)?;
    let root: Hash = bytes.as_slice().try_into().map_err(|_| {
        ChunkError::InvalidProof(format!("data root must be {HASH_SIZE} bytes, got {}", bytes.len()))
    })?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_store::InMemoryStore;

    fn chunk_store() -> ChunkStore {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(OffsetLedger::new(Arc::clone(&store)));
        ChunkStore::new(store, ledger)
    }

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn meta_for(id: &str, data: &[u8]) -> TransactionMeta {
        TransactionMeta {
            id: id.into(),
            data_size: data.len().to_string(),
            data_root: ChunkTree::build(data).data_root(),
            ..TransactionMeta::default()
        }
    }

    #[tokio::test]
    async fn empty_payload_is_null_data() {
        let store = chunk_store();
        let meta = TransactionMeta {
            data_size: "0".into(),
            ..TransactionMeta::default()
        };
        assert!(matches!(store.split_and_store(&meta, &[]).await, Err(ChunkError::NullData)));
    }

    #[tokio::test]
    async fn payloads_round_trip_at_chunk_boundaries() {
        let store = chunk_store();
        let sizes = [1, MAX_CHUNK_SIZE, MAX_CHUNK_SIZE * 5 / 2, MAX_CHUNK_SIZE + 17];
        for (i, size) in sizes.into_iter().enumerate() {
            let data = payload(size, i as u8);
            let meta = meta_for(&format!("tx{i}"), &data);
            store.split_and_store(&meta, &data).await.unwrap();
            let loaded = store.load_payload(&meta.data_root, size as u64).await.unwrap();
            assert_eq!(loaded, data, "size {size}");
        }
    }

    #[tokio::test]
    async fn huge_declared_size_without_chunks_is_not_exist() {
        let store = chunk_store();
        let size = (1u64 << 63) + 5;
        store.ledger().ensure_offset("R", &size.to_string()).await.unwrap();
        let err = store.load_payload("R", size).await.unwrap_err();
        assert!(err.is_not_exist(), "{err}");
    }

    #[tokio::test]
    async fn first_payload_chunks_start_at_address_one() {
        let store = chunk_store();
        let data = payload(100, 0);
        let meta = meta_for("tx", &data);
        store.split_and_store(&meta, &data).await.unwrap();

        assert_eq!(store.ledger().end_offset(&meta.data_root, 100).await.unwrap(), 100);
        let chunk = store.get_chunk(1).await.unwrap();
        assert_eq!(chunk.chunk, data);
        assert_eq!(chunk.offset, "99");
        assert_eq!(chunk_start_offset(100, 100, 99, 100), 1);
        assert_eq!(chunk_start_offset(150, 50, 49, 50), 101);
    }

    #[tokio::test]
    async fn wrong_root_is_rejected_before_any_offset_is_assigned() {
        let store = chunk_store();
        let data = payload(10, 1);
        let mut meta = meta_for("tx", &data);
        meta.data_root = ChunkTree::build(b"something else").data_root();

        let err = store.split_and_store(&meta, &data).await.unwrap_err();
        assert!(matches!(err, ChunkError::InconsistentRoot { .. }));
        assert_eq!(store.ledger().data_end_offset().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn declared_size_must_match_payload() {
        let store = chunk_store();
        let data = payload(10, 1);
        let mut meta = meta_for("tx", &data);
        meta.data_size = "11".into();
        assert!(matches!(
            store.split_and_store(&meta, &data).await,
            Err(ChunkError::SizeMismatch { declared: 11, actual: 10 })
        ));
    }

    #[tokio::test]
    async fn storing_the_same_payload_twice_is_idempotent() {
        let store = chunk_store();
        let data = payload(MAX_CHUNK_SIZE + 100, 3);
        let meta = meta_for("tx", &data);
        store.split_and_store(&meta, &data).await.unwrap();
        store.split_and_store(&meta, &data).await.unwrap();
        assert_eq!(store.ledger().data_end_offset().await.unwrap(), data.len() as u64);
        assert_eq!(store.load_payload(&meta.data_root, data.len() as u64).await.unwrap(), data);
    }

    #[tokio::test]
    async fn missing_chunk_fails_whole_load() {
        let store = chunk_store();
        let data = payload(MAX_CHUNK_SIZE * 2, 4);
        let meta = meta_for("tx", &data);
        store.split_and_store(&meta, &data).await.unwrap();

        let second_start = 1 + MAX_CHUNK_SIZE as u64;
        store.store.delete(Bucket::Chunk, &second_start.to_string()).await.unwrap();
        let err = store.load_payload(&meta.data_root, data.len() as u64).await.unwrap_err();
        assert!(err.is_not_exist());
        assert!(!store.has_payload(&meta.data_root, data.len() as u64).await.unwrap());
    }

    #[tokio::test]
    async fn chunks_can_arrive_one_at_a_time_in_any_order() {
        let source = chunk_store();
        let target = chunk_store();
        let data = payload(MAX_CHUNK_SIZE * 3 + 5, 9);
        let meta = meta_for("tx", &data);
        source.split_and_store(&meta, &data).await.unwrap();

        let chunks = ChunkTree::build(&data).to_chunks(&data);
        // Unknown payload: the offset must be assigned first.
        assert!(target.store_chunk(&chunks[0]).await.unwrap_err().is_not_exist());

        target.ledger().ensure_offset(&meta.data_root, &meta.data_size).await.unwrap();
        for chunk in chunks.iter().rev() {
            target.store_chunk(chunk).await.unwrap();
        }
        // Resubmission is harmless.
        target.store_chunk(&chunks[1]).await.unwrap();
        assert_eq!(target.load_payload(&meta.data_root, data.len() as u64).await.unwrap(), data);
    }

    #[tokio::test]
    async fn tampered_chunk_bytes_are_rejected() {
        let store = chunk_store();
        let data = payload(1000, 2);
        let meta = meta_for("tx", &data);
        store.ledger().ensure_offset(&meta.data_root, &meta.data_size).await.unwrap();

        let mut chunk = ChunkTree::build(&data).to_chunks(&data).remove(0);
        chunk.chunk[0] ^= 0xFF;
        let err = store.store_chunk(&chunk).await.unwrap_err();
        assert!(err.is_validation());
    }
}
