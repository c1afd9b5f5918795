use std::sync::Arc;

use seeder_store::{Bucket, KeyValueStore, StoreError};
use seeder_types::TaskKey;
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};
use crate::manager::TaskManager;
use crate::pool::PendingPool;
use crate::queue::WorkQueue;
use crate::task::Task;

/// Outcome of [`TaskScheduler::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submitted {
    /// Registered, marked pending and queued.
    Queued,
    /// A live task already exists for this key; nothing was queued.
    AlreadyRegistered,
}

/// Ties the in-memory registry to the pending pool, the work queue and
/// the persisted task snapshots.
pub struct TaskScheduler {
    manager: Arc<TaskManager>,
    pool: PendingPool,
    queue: WorkQueue,
    store: Arc<dyn KeyValueStore>,
}

impl TaskScheduler {
    /// The queue is bounded by the registry capacity, so every registered
    /// task fits in it.
    pub fn new(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            manager: Arc::new(TaskManager::new(capacity)),
            pool: PendingPool::new(Arc::clone(&store)),
            queue: WorkQueue::new(capacity),
            store,
        }
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Register a task, write its pending marker, then queue it.
    pub async fn submit(&self, key: TaskKey) -> TaskResult<Submitted> {
        if !self.manager.add_task(key.clone())? {
            return Ok(Submitted::AlreadyRegistered);
        }
        if let Err(e) = self.pool.add(&key).await {
            self.manager.remove_task(&key);
            return Err(e);
        }
        self.queue.push(key.clone()).await?;
        debug!(task = %key, "task queued");
        Ok(Submitted::Queued)
    }

    /// Next queued key.
    pub async fn next(&self) -> Option<TaskKey> {
        self.queue.pop().await
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self, key: &TaskKey) -> TaskResult<()> {
        self.manager.close_task(key)
    }

    /// Close a task and retire it: persist its snapshot under the task
    /// bucket, remove its pending marker, then drop it from memory.
    ///
    /// The registry entry outlives the marker, so a resubmission of the
    /// same key during retirement sees `AlreadyRegistered` and never has
    /// its fresh marker deleted here.
    ///
    /// Not atomic across a crash. A leftover marker only re-registers the
    /// task on restart, where it is closed again.
    pub async fn finish(&self, key: &TaskKey) -> TaskResult<Option<Task>> {
        let snapshot = match self.manager.close_task(key) {
            Ok(()) => self.manager.get_task(key),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(task) = &snapshot {
            let encoded =
                bincode::serialize(task).map_err(|e| TaskError::Serialization(e.to_string()))?;
            self.store
                .put(Bucket::Task, &key.to_string(), &encoded)
                .await?;
        }
        self.pool.remove(key).await?;
        if snapshot.is_some() {
            self.manager.remove_task(key);
        }

        if let Some(task) = &snapshot {
            info!(
                task = %key,
                succeeded = task.succeeded,
                failed = task.failed,
                peers = task.total_peers,
                "task finished"
            );
        }
        Ok(snapshot)
    }

    /// Live task if registered, otherwise its persisted snapshot.
    pub async fn status(&self, key: &TaskKey) -> TaskResult<Task> {
        if let Some(task) = self.manager.get_task(key) {
            return Ok(task);
        }
        match self.store.get(Bucket::Task, &key.to_string()).await {
            Ok(raw) => bincode::deserialize(&raw).map_err(|e| TaskError::Serialization(e.to_string())),
            Err(StoreError::NotExist { .. }) => Err(TaskError::NotFound(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild the registry and the queue from the pending pool.
    ///
    /// Must run once workers are draining the queue, since the pool may
    /// hold more entries than the queue bound. A malformed marker is
    /// logged, deleted and skipped.
    pub async fn recover(&self) -> TaskResult<usize> {
        let mut restored = 0;
        for raw in self.pool.raw_keys().await? {
            let key = match TaskKey::parse(&raw) {
                Ok(key) => key,
                Err(e) => {
                    warn!(marker = %raw, error = %e, "skipping corrupt pending-pool entry");
                    if let Err(e) = self.pool.remove_raw(&raw).await {
                        warn!(marker = %raw, error = %e, "failed to delete corrupt marker");
                    }
                    continue;
                }
            };
            if self.manager.restore_task(key.clone()) {
                self.queue.push(key).await?;
                restored += 1;
            }
        }
        if restored > 0 {
            info!(tasks = restored, "recovered pending tasks");
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;
    use async_trait::async_trait;
    use seeder_store::{BatchOp, InMemoryStore, StoreResult};
    use seeder_types::TaskType;
    use tokio::sync::Notify;

    /// Holds every pending-pool delete until released.
    struct GatedDeletes {
        inner: InMemoryStore,
        reached: Notify,
        release: Notify,
    }

    #[async_trait]
    impl KeyValueStore for GatedDeletes {
        fn kind(&self) -> &'static str {
            "gated"
        }

        async fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
            self.inner.put(bucket, key, value).await
        }

        async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Vec<u8>> {
            self.inner.get(bucket, key).await
        }

        async fn get_all_keys(&self, bucket: Bucket) -> StoreResult<Vec<String>> {
            self.inner.get_all_keys(bucket).await
        }

        async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()> {
            if bucket == Bucket::PendingPool {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.delete(bucket, key).await
        }

        async fn write_batch(&self, ops: &[BatchOp]) -> StoreResult<()> {
            self.inner.write_batch(ops).await
        }

        async fn close(&self) -> StoreResult<()> {
            self.inner.close().await
        }
    }

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryStore::new())
    }

    fn key(id: &str) -> TaskKey {
        TaskKey::new(id, TaskType::Broadcast)
    }

    #[tokio::test]
    async fn submit_registers_marks_and_queues() {
        let store = store();
        let scheduler = TaskScheduler::new(Arc::clone(&store), 4);
        assert_eq!(scheduler.submit(key("a")).await.unwrap(), Submitted::Queued);
        assert_eq!(
            scheduler.submit(key("a")).await.unwrap(),
            Submitted::AlreadyRegistered
        );

        assert!(store.exists(Bucket::PendingPool, "broadcast-a").await.unwrap());
        assert_eq!(scheduler.queue().len(), 1);
        assert_eq!(scheduler.next().await.unwrap(), key("a"));
    }

    #[tokio::test]
    async fn submit_beyond_capacity_is_rejected_without_marker() {
        let store = store();
        let scheduler = TaskScheduler::new(Arc::clone(&store), 1);
        scheduler.submit(key("a")).await.unwrap();
        let err = scheduler.submit(key("b")).await.unwrap_err();
        assert!(matches!(err, TaskError::FullyLoaded { capacity: 1 }));
        assert!(!store.exists(Bucket::PendingPool, "broadcast-b").await.unwrap());
    }

    #[tokio::test]
    async fn finish_persists_snapshot_and_clears_pending_state() {
        let store = store();
        let scheduler = TaskScheduler::new(Arc::clone(&store), 4);
        scheduler.submit(key("a")).await.unwrap();
        scheduler.manager().task_begin_set(&key("a"), 2).unwrap();
        scheduler.manager().inc_succeeded(&key("a"));

        let task = scheduler.finish(&key("a")).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Closed);
        assert!(scheduler.manager().get_task(&key("a")).is_none());
        assert!(!store.exists(Bucket::PendingPool, "broadcast-a").await.unwrap());

        let status = scheduler.status(&key("a")).await.unwrap();
        assert_eq!(status.state, TaskState::Closed);
        assert_eq!(status.succeeded, 1);
        assert_eq!(status.total_peers, 2);
    }

    #[tokio::test]
    async fn resubmit_during_retirement_keeps_the_marker_of_the_live_task() {
        let gated = Arc::new(GatedDeletes {
            inner: InMemoryStore::new(),
            reached: Notify::new(),
            release: Notify::new(),
        });
        let store: Arc<dyn KeyValueStore> = gated.clone();
        let scheduler = Arc::new(TaskScheduler::new(Arc::clone(&store), 4));
        scheduler.submit(key("a")).await.unwrap();
        scheduler.next().await.unwrap();

        let finishing = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.finish(&key("a")).await })
        };
        gated.reached.notified().await;
        assert_eq!(
            scheduler.submit(key("a")).await.unwrap(),
            Submitted::AlreadyRegistered
        );
        gated.release.notify_one();
        finishing.await.unwrap().unwrap();

        // Once retired, a new submission is live and durably marked.
        assert_eq!(scheduler.submit(key("a")).await.unwrap(), Submitted::Queued);
        assert!(scheduler.manager().get_task(&key("a")).is_some());
        assert!(store.exists(Bucket::PendingPool, "broadcast-a").await.unwrap());
    }

    #[tokio::test]
    async fn finish_of_unknown_task_still_clears_marker() {
        let store = store();
        store.put(Bucket::PendingPool, "broadcast-a", b"x").await.unwrap();
        let scheduler = TaskScheduler::new(Arc::clone(&store), 4);
        assert!(scheduler.finish(&key("a")).await.unwrap().is_none());
        assert!(!store.exists(Bucket::PendingPool, "broadcast-a").await.unwrap());
    }

    #[tokio::test]
    async fn status_of_unknown_task_is_not_found() {
        let scheduler = TaskScheduler::new(store(), 4);
        assert!(scheduler.status(&key("nope")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn recover_restores_markers_and_skips_corrupt_ones() {
        let store = store();
        for marker in ["sync-t1", "broadcast-t2", "garbage", "teleport-t3"] {
            store.put(Bucket::PendingPool, marker, b"x").await.unwrap();
        }

        // Capacity smaller than the pool: recovery must not drop tasks.
        let scheduler = TaskScheduler::new(Arc::clone(&store), 1);
        let drained = {
            let queue = scheduler.queue().clone();
            tokio::spawn(async move {
                let mut keys = vec![queue.pop().await.unwrap(), queue.pop().await.unwrap()];
                keys.sort();
                keys
            })
        };
        assert_eq!(scheduler.recover().await.unwrap(), 2);

        let keys = drained.await.unwrap();
        assert_eq!(
            keys,
            vec![TaskKey::new("t1", TaskType::Sync), TaskKey::new("t2", TaskType::Broadcast)]
        );
        assert_eq!(scheduler.manager().len(), 2);
        assert!(!store.exists(Bucket::PendingPool, "garbage").await.unwrap());
        assert!(!store.exists(Bucket::PendingPool, "teleport-t3").await.unwrap());
        assert!(store.exists(Bucket::PendingPool, "sync-t1").await.unwrap());
    }

    #[tokio::test]
    async fn recovered_task_can_be_closed_again() {
        let store = store();
        store.put(Bucket::PendingPool, "broadcast-a", b"x").await.unwrap();
        let scheduler = TaskScheduler::new(Arc::clone(&store), 4);
        scheduler.recover().await.unwrap();

        scheduler.cancel(&key("a")).unwrap();
        assert!(scheduler.manager().is_closed(&key("a")));
        scheduler.finish(&key("a")).await.unwrap();
        assert!(store.get_all_keys(Bucket::PendingPool).await.unwrap().is_empty());
    }
}
