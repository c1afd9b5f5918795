use std::sync::Arc;

use seeder_types::TaskKey;
use tokio::sync::{mpsc, Mutex};

use crate::error::{TaskError, TaskResult};

/// Bounded multi-producer, multi-consumer queue of task keys.
///
/// Producers wait when the queue is full. Consumers share one receiver.
#[derive(Clone)]
pub struct WorkQueue {
    sender: mpsc::Sender<TaskKey>,
    receiver: Arc<Mutex<mpsc::Receiver<TaskKey>>>,
}

impl WorkQueue {
    pub fn new(bound: usize) -> Self {
        let (sender, receiver) = mpsc::channel(bound.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    pub async fn push(&self, key: TaskKey) -> TaskResult<()> {
        self.sender.send(key).await.map_err(|_| TaskError::QueueClosed)
    }

    /// Next key. Waits while the queue is empty; `None` only if the
    /// channel was closed.
    pub async fn pop(&self) -> Option<TaskKey> {
        self.receiver.lock().await.recv().await
    }

    /// Number of queued keys.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_types::TaskType;

    #[tokio::test]
    async fn keys_come_out_in_order() {
        let queue = WorkQueue::new(4);
        for id in ["a", "b", "c"] {
            queue.push(TaskKey::new(id, TaskType::Sync)).await.unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await.unwrap().tx_id, "a");
        assert_eq!(queue.pop().await.unwrap().tx_id, "b");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let queue = WorkQueue::new(1);
        queue.push(TaskKey::new("a", TaskType::Sync)).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(TaskKey::new("b", TaskType::Sync)).await })
        };
        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        assert_eq!(queue.pop().await.unwrap().tx_id, "a");
        producer.await.unwrap().unwrap();
        assert_eq!(queue.pop().await.unwrap().tx_id, "b");
    }

    #[tokio::test]
    async fn concurrent_consumers_each_get_distinct_keys() {
        let queue = WorkQueue::new(16);
        for i in 0..16 {
            queue.push(TaskKey::new(format!("tx{i}"), TaskType::Broadcast)).await.unwrap();
        }
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut got = Vec::new();
                    for _ in 0..4 {
                        got.push(queue.pop().await.unwrap().tx_id);
                    }
                    got
                })
            })
            .collect();
        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 16);
    }
}
