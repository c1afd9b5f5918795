use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Node behaviour, the `[node]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Canonical gateway, always first in the fan-out order.
    pub gateway: String,
    /// Peers known without discovery.
    pub peers: Vec<String>,
    /// Number of job workers draining the work queue.
    pub workers: usize,
    /// Maximum number of live tasks.
    pub task_capacity: usize,
    /// Seconds between peer discovery rounds. Zero disables the loop.
    pub peer_refresh_secs: u64,
    /// Deadline for each peer request.
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gateway: "https://arweave.net".to_string(),
            peers: Vec::new(),
            workers: 4,
            task_capacity: 1024,
            peer_refresh_secs: 600,
            request_timeout_secs: 30,
        }
    }
}

impl NodeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn peer_refresh_interval(&self) -> Option<Duration> {
        (self.peer_refresh_secs > 0).then(|| Duration::from_secs(self.peer_refresh_secs))
    }
}
