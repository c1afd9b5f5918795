use seeder_task::TaskError;

/// Errors that stop a fan-out before it starts. Per-peer failures are
/// counted, never returned.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Result alias for fan-out operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;
