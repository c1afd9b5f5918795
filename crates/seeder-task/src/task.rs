use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seeder_types::{TaskKey, TaskType};

/// Lifecycle of a task. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Registered, fan-out not started.
    Pending,
    /// Peer count set, fan-out in progress.
    Running,
    /// Terminal. No further peers are attempted.
    Closed,
}

/// One unit of propagation or sync work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub key: TaskKey,
    pub state: TaskState,
    pub succeeded: u64,
    pub failed: u64,
    pub total_peers: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(key: TaskKey) -> Self {
        Self {
            key,
            state: TaskState::Pending,
            succeeded: 0,
            failed: 0,
            total_peers: 0,
            created_at: Utc::now(),
            started_at: None,
            closed_at: None,
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.key.tx_id
    }

    pub fn task_type(&self) -> TaskType {
        self.key.task_type
    }

    pub fn is_closed(&self) -> bool {
        self.state == TaskState::Closed
    }

    /// Move to `Running`. A closed task is left as is.
    pub(crate) fn begin(&mut self, total_peers: usize) {
        if self.is_closed() {
            return;
        }
        self.state = TaskState::Running;
        self.total_peers = total_peers;
        self.started_at = Some(Utc::now());
    }

    /// Move to `Closed`. Returns `false` if it already was.
    pub(crate) fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = TaskState::Closed;
        self.closed_at = Some(Utc::now());
        true
    }
}
