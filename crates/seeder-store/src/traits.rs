use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::error::StoreResult;

/// One operation inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    Put {
        bucket: Bucket,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        bucket: Bucket,
        key: String,
    },
}

impl BatchOp {
    pub fn put(bucket: Bucket, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            bucket,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(bucket: Bucket, key: impl Into<String>) -> Self {
        Self::Delete {
            bucket,
            key: key.into(),
        }
    }
}

/// Bucketed key/value store.
///
/// All implementations must satisfy these invariants:
/// - `get` on a missing key returns `StoreError::NotExist`, never an empty
///   success.
/// - Single-key operations are atomic per key; concurrent writers to
///   different keys never observe each other's partial state.
/// - `write_batch` commits every operation or none of them, including
///   across a crash.
/// - Keys never contain `/`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Create or overwrite a value.
    async fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Read a value.
    ///
    /// Returns `Err(StoreError::NotExist)` if the key does not exist.
    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Vec<u8>>;

    /// All keys in a bucket, in ascending byte order.
    async fn get_all_keys(&self, bucket: Bucket) -> StoreResult<Vec<String>>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()>;

    /// Apply several operations atomically.
    async fn write_batch(&self, ops: &[BatchOp]) -> StoreResult<()>;

    /// Release backend resources. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> StoreResult<()>;

    /// Check whether a key exists.
    async fn exists(&self, bucket: Bucket, key: &str) -> StoreResult<bool> {
        match self.get(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_exist() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read a value, mapping not-found to `None`.
    async fn get_optional(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.get(bucket, key).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_exist() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Behaviour every backend must share. Each backend's tests run this suite.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::error::StoreError;

    pub async fn run(store: &dyn KeyValueStore) {
        missing_key_is_not_exist(store).await;
        empty_value_is_distinct_from_missing(store).await;
        put_get_overwrite(store).await;
        buckets_are_isolated(store).await;
        keys_are_sorted(store).await;
        delete_is_idempotent(store).await;
        batch_applies_everything(store).await;
    }

    async fn missing_key_is_not_exist(store: &dyn KeyValueStore) {
        let err = store.get(Bucket::TxMeta, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotExist { bucket: Bucket::TxMeta, .. }));
        assert!(!store.exists(Bucket::TxMeta, "nope").await.unwrap());
        assert!(store.get_optional(Bucket::TxMeta, "nope").await.unwrap().is_none());
    }

    async fn empty_value_is_distinct_from_missing(store: &dyn KeyValueStore) {
        store.put(Bucket::PendingPool, "empty", b"").await.unwrap();
        assert_eq!(store.get(Bucket::PendingPool, "empty").await.unwrap(), Vec::<u8>::new());
        store.delete(Bucket::PendingPool, "empty").await.unwrap();
    }

    async fn put_get_overwrite(store: &dyn KeyValueStore) {
        store.put(Bucket::TxMeta, "a", b"one").await.unwrap();
        assert_eq!(store.get(Bucket::TxMeta, "a").await.unwrap(), b"one".to_vec());
        store.put(Bucket::TxMeta, "a", b"two").await.unwrap();
        assert_eq!(store.get(Bucket::TxMeta, "a").await.unwrap(), b"two".to_vec());
    }

    async fn buckets_are_isolated(store: &dyn KeyValueStore) {
        store.put(Bucket::Task, "shared", b"task").await.unwrap();
        store.put(Bucket::PendingPool, "shared", b"pool").await.unwrap();
        assert_eq!(store.get(Bucket::Task, "shared").await.unwrap(), b"task".to_vec());
        store.delete(Bucket::Task, "shared").await.unwrap();
        assert!(store.exists(Bucket::PendingPool, "shared").await.unwrap());
        store.delete(Bucket::PendingPool, "shared").await.unwrap();
    }

    async fn keys_are_sorted(store: &dyn KeyValueStore) {
        for key in ["c", "a", "b"] {
            store.put(Bucket::BundleItems, key, key.as_bytes()).await.unwrap();
        }
        let keys = store.get_all_keys(Bucket::BundleItems).await.unwrap();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(store.get_all_keys(Bucket::PeerWeight).await.unwrap().is_empty());
    }

    async fn delete_is_idempotent(store: &dyn KeyValueStore) {
        store.put(Bucket::Chunk, "1", b"x").await.unwrap();
        store.delete(Bucket::Chunk, "1").await.unwrap();
        store.delete(Bucket::Chunk, "1").await.unwrap();
        assert!(!store.exists(Bucket::Chunk, "1").await.unwrap());
    }

    async fn batch_applies_everything(store: &dyn KeyValueStore) {
        store.put(Bucket::Task, "old", b"x").await.unwrap();
        store
            .write_batch(&[
                BatchOp::put(Bucket::Constants, "counter", b"150".to_vec()),
                BatchOp::put(Bucket::TxDataEndOffset, "R2-50", b"150".to_vec()),
                BatchOp::delete(Bucket::Task, "old"),
            ])
            .await
            .unwrap();
        assert_eq!(store.get(Bucket::Constants, "counter").await.unwrap(), b"150".to_vec());
        assert_eq!(store.get(Bucket::TxDataEndOffset, "R2-50").await.unwrap(), b"150".to_vec());
        assert!(!store.exists(Bucket::Task, "old").await.unwrap());
    }
}
