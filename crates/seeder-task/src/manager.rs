use std::collections::HashMap;
use std::sync::RwLock;

use seeder_types::TaskKey;
use tracing::debug;

use crate::error::{TaskError, TaskResult};
use crate::task::Task;

/// In-memory registry of live tasks, at most one per [`TaskKey`].
///
/// A single `RwLock` guards the map. It is only ever held for map access,
/// never across I/O.
pub struct TaskManager {
    tasks: RwLock<HashMap<TaskKey, Task>>,
    capacity: usize,
}

impl TaskManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a task. Returns `false` if one is already registered under
    /// `key`, and `FullyLoaded` if the registry is at capacity.
    pub fn add_task(&self, key: TaskKey) -> TaskResult<bool> {
        let mut tasks = self.tasks.write().expect("task map lock poisoned");
        if tasks.contains_key(&key) {
            return Ok(false);
        }
        if tasks.len() >= self.capacity {
            return Err(TaskError::FullyLoaded {
                capacity: self.capacity,
            });
        }
        debug!(task = %key, "task registered");
        tasks.insert(key.clone(), Task::new(key));
        Ok(true)
    }

    /// Register a task found in the pending pool at startup. Ignores the
    /// capacity bound so that no persisted task is dropped.
    pub fn restore_task(&self, key: TaskKey) -> bool {
        let mut tasks = self.tasks.write().expect("task map lock poisoned");
        if tasks.contains_key(&key) {
            return false;
        }
        tasks.insert(key.clone(), Task::new(key));
        true
    }

    /// Stamp the start time and peer count.
    pub fn task_begin_set(&self, key: &TaskKey, total_peers: usize) -> TaskResult<()> {
        let mut tasks = self.tasks.write().expect("task map lock poisoned");
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| TaskError::NotFound(key.clone()))?;
        task.begin(total_peers);
        Ok(())
    }

    /// Count one peer success. No-op for an unknown task.
    pub fn inc_succeeded(&self, key: &TaskKey) {
        if let Some(task) = self.tasks.write().expect("task map lock poisoned").get_mut(key) {
            task.succeeded += 1;
        }
    }

    /// Count one peer failure. No-op for an unknown task.
    pub fn inc_failed(&self, key: &TaskKey) {
        if let Some(task) = self.tasks.write().expect("task map lock poisoned").get_mut(key) {
            task.failed += 1;
        }
    }

    /// Whether the fan-out for `key` should stop. A task that is no longer
    /// registered counts as closed.
    pub fn is_closed(&self, key: &TaskKey) -> bool {
        self.tasks
            .read()
            .expect("task map lock poisoned")
            .get(key)
            .map_or(true, Task::is_closed)
    }

    /// Mark a task closed. Closing an already closed task is a no-op;
    /// closing an unknown task is `NotFound`.
    pub fn close_task(&self, key: &TaskKey) -> TaskResult<()> {
        let mut tasks = self.tasks.write().expect("task map lock poisoned");
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| TaskError::NotFound(key.clone()))?;
        if task.close() {
            debug!(task = %key, succeeded = task.succeeded, failed = task.failed, "task closed");
        }
        Ok(())
    }

    /// Snapshot of a live task.
    pub fn get_task(&self, key: &TaskKey) -> Option<Task> {
        self.tasks
            .read()
            .expect("task map lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn remove_task(&self, key: &TaskKey) -> Option<Task> {
        self.tasks
            .write()
            .expect("task map lock poisoned")
            .remove(key)
    }

    /// Snapshots of all live tasks.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .expect("task map lock poisoned")
            .values()
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.key.cmp(&b.key));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.read().expect("task map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::task::TaskState;
    use seeder_types::TaskType;

    fn key(id: &str) -> TaskKey {
        TaskKey::new(id, TaskType::Broadcast)
    }

    #[test]
    fn add_task_is_idempotent_per_key() {
        let manager = TaskManager::new(4);
        assert!(manager.add_task(key("a")).unwrap());
        assert!(!manager.add_task(key("a")).unwrap());
        assert!(manager.add_task(TaskKey::new("a", TaskType::Sync)).unwrap());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn capacity_overflow_is_fully_loaded_until_a_task_leaves() {
        let manager = TaskManager::new(2);
        manager.add_task(key("a")).unwrap();
        manager.add_task(key("b")).unwrap();
        assert!(matches!(
            manager.add_task(key("c")),
            Err(TaskError::FullyLoaded { capacity: 2 })
        ));
        // Re-adding a present key is still fine at capacity.
        assert!(!manager.add_task(key("a")).unwrap());

        manager.remove_task(&key("a"));
        assert!(manager.add_task(key("c")).unwrap());
    }

    #[test]
    fn restore_ignores_capacity() {
        let manager = TaskManager::new(1);
        manager.add_task(key("a")).unwrap();
        assert!(manager.restore_task(key("b")));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn begin_set_requires_registered_task() {
        let manager = TaskManager::new(4);
        assert!(manager.task_begin_set(&key("a"), 3).unwrap_err().is_not_found());

        manager.add_task(key("a")).unwrap();
        manager.task_begin_set(&key("a"), 3).unwrap();
        let task = manager.get_task(&key("a")).unwrap();
        assert_eq!(task.state, TaskState::Running);
        assert_eq!(task.total_peers, 3);
        assert!(task.started_at.is_some());
    }

    #[test]
    fn begin_set_does_not_reopen_a_closed_task() {
        let manager = TaskManager::new(4);
        manager.add_task(key("a")).unwrap();
        manager.close_task(&key("a")).unwrap();
        manager.task_begin_set(&key("a"), 3).unwrap();
        assert_eq!(manager.get_task(&key("a")).unwrap().state, TaskState::Closed);
    }

    #[test]
    fn counters_are_noops_for_unknown_tasks() {
        let manager = TaskManager::new(4);
        manager.inc_succeeded(&key("ghost"));
        manager.inc_failed(&key("ghost"));
        assert!(manager.is_empty());

        manager.add_task(key("a")).unwrap();
        manager.inc_succeeded(&key("a"));
        manager.inc_failed(&key("a"));
        manager.inc_failed(&key("a"));
        let task = manager.get_task(&key("a")).unwrap();
        assert_eq!((task.succeeded, task.failed), (1, 2));
    }

    #[test]
    fn close_twice_is_ok_then_not_found_after_removal() {
        let manager = TaskManager::new(4);
        manager.add_task(key("a")).unwrap();
        manager.close_task(&key("a")).unwrap();
        let closed_at = manager.get_task(&key("a")).unwrap().closed_at;
        manager.close_task(&key("a")).unwrap();
        assert_eq!(manager.get_task(&key("a")).unwrap().closed_at, closed_at);

        manager.remove_task(&key("a"));
        assert!(manager.close_task(&key("a")).unwrap_err().is_not_found());
    }

    #[test]
    fn unknown_task_reads_as_closed() {
        let manager = TaskManager::new(4);
        assert!(manager.is_closed(&key("ghost")));
        manager.add_task(key("a")).unwrap();
        assert!(!manager.is_closed(&key("a")));
    }

    #[test]
    fn close_is_visible_to_concurrent_readers() {
        let manager = Arc::new(TaskManager::new(4));
        manager.add_task(key("a")).unwrap();
        manager.close_task(&key("a")).unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.is_closed(&key("a")))
            })
            .collect();
        for reader in readers {
            assert!(reader.join().unwrap());
        }
    }
}
