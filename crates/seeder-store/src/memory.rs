use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::bucket::Bucket;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BatchOp, KeyValueStore};

/// In-memory, HashMap-based key/value store.
///
/// Intended for tests and embedding. Buckets are held behind a single
/// `RwLock`; a batch takes the write lock once, which makes it atomic.
pub struct InMemoryStore {
    buckets: RwLock<HashMap<Bucket, BTreeMap<String, Vec<u8>>>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of keys currently stored in a bucket.
    pub fn len(&self, bucket: Bucket) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(&bucket)
            .map_or(0, BTreeMap::len)
    }

    /// Returns `true` if no bucket holds any key.
    pub fn is_empty(&self) -> bool {
        self.buckets
            .read()
            .expect("lock poisoned")
            .values()
            .all(BTreeMap::is_empty)
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check_open()?;
        let mut map = self.buckets.write().expect("lock poisoned");
        map.entry(bucket)
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Vec<u8>> {
        self.check_open()?;
        let map = self.buckets.read().expect("lock poisoned");
        map.get(&bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| StoreError::not_exist(bucket, key))
    }

    async fn get_all_keys(&self, bucket: Bucket) -> StoreResult<Vec<String>> {
        self.check_open()?;
        let map = self.buckets.read().expect("lock poisoned");
        Ok(map
            .get(&bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()> {
        self.check_open()?;
        let mut map = self.buckets.write().expect("lock poisoned");
        if let Some(b) = map.get_mut(&bucket) {
            b.remove(key);
        }
        Ok(())
    }

    async fn write_batch(&self, ops: &[BatchOp]) -> StoreResult<()> {
        self.check_open()?;
        let mut map = self.buckets.write().expect("lock poisoned");
        for op in ops {
            match op {
                BatchOp::Put { bucket, key, value } => {
                    map.entry(*bucket)
                        .or_default()
                        .insert(key.clone(), value.clone());
                }
                BatchOp::Delete { bucket, key } => {
                    if let Some(b) = map.get_mut(bucket) {
                        b.remove(key);
                    }
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buckets = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryStore")
            .field("bucket_count", &buckets)
            .finish()
    }
}
