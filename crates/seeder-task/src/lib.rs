//! Task orchestration.
//!
//! - [`TaskManager`] -- bounded in-memory registry, one live [`Task`] per key
//! - [`PendingPool`] -- durable markers for tasks that have not closed yet
//! - [`WorkQueue`] -- bounded queue drained by the node's workers
//! - [`TaskScheduler`] -- submit, finish, status and crash recovery on top of
//!   the three

pub mod error;
pub mod manager;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use error::{TaskError, TaskResult};
pub use manager::TaskManager;
pub use pool::PendingPool;
pub use queue::WorkQueue;
pub use scheduler::{Submitted, TaskScheduler};
pub use task::{Task, TaskState};
