use std::sync::Arc;

use chrono::Utc;
use seeder_store::{Bucket, KeyValueStore};
use seeder_types::TaskKey;

use crate::error::TaskResult;

/// Durable markers for tasks that were registered but have not closed.
///
/// A marker is written before a task is queued and removed only after the
/// task closes, so the markers are exactly what must be resumed on restart.
#[derive(Clone)]
pub struct PendingPool {
    store: Arc<dyn KeyValueStore>,
}

impl PendingPool {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, key: &TaskKey) -> TaskResult<()> {
        let stamp = Utc::now().to_rfc3339();
        self.store
            .put(Bucket::PendingPool, &key.to_string(), stamp.as_bytes())
            .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &TaskKey) -> TaskResult<()> {
        self.remove_raw(&key.to_string()).await
    }

    pub(crate) async fn remove_raw(&self, raw: &str) -> TaskResult<()> {
        self.store.delete(Bucket::PendingPool, raw).await?;
        Ok(())
    }

    pub async fn contains(&self, key: &TaskKey) -> TaskResult<bool> {
        Ok(self.store.exists(Bucket::PendingPool, &key.to_string()).await?)
    }

    /// Raw marker keys. Parsing is left to the caller so that one corrupt
    /// marker never hides the others.
    pub async fn raw_keys(&self) -> TaskResult<Vec<String>> {
        Ok(self.store.get_all_keys(Bucket::PendingPool).await?)
    }
}
