use seeder_store::StoreError;
use seeder_types::{TaskKey, TypeError};

/// Errors from task orchestration.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No task is registered (or persisted) under this key.
    #[error("task not found: {0}")]
    NotFound(TaskKey),

    /// The registry holds its maximum number of live tasks.
    #[error("task registry fully loaded ({capacity} tasks)")]
    FullyLoaded { capacity: usize },

    /// Every worker has gone away.
    #[error("work queue closed")]
    QueueClosed,

    /// A persisted task snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TaskError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for task operations.
pub type TaskResult<T> = Result<T, TaskError>;
