use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Kind of work tracked for a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Fetch the transaction and its payload from peers.
    Sync,
    /// Submit the transaction and upload its payload to peers.
    Broadcast,
    /// Submit the transaction record only.
    BroadcastMeta,
    /// Fetch a manifest and schedule a sync for every path it references.
    SyncManifest,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        Self::Sync,
        Self::Broadcast,
        Self::BroadcastMeta,
        Self::SyncManifest,
    ];

    /// Wire name. Never contains `-`, which separates the type from the id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Broadcast => "broadcast",
            Self::BroadcastMeta => "broadcast_meta",
            Self::SyncManifest => "sync_manifest",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = TypeError;

    fn from_str(s: &str) -> TypeResult<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| TypeError::UnknownTaskType(s.to_string()))
    }
}

/// Identity of a task: one live task per (transaction id, task type).
///
/// Rendered as `{type}-{tx_id}` in storage and on the wire. Parsing splits
/// on the first `-`, so ids that themselves contain `-` survive intact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub task_type: TaskType,
    pub tx_id: String,
}

impl TaskKey {
    pub fn new(tx_id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            task_type,
            tx_id: tx_id.into(),
        }
    }

    /// Parse a `{type}-{tx_id}` string.
    pub fn parse(s: &str) -> TypeResult<Self> {
        let (ty, id) = s
            .split_once('-')
            .ok_or_else(|| TypeError::MalformedTaskId(s.to_string()))?;
        if id.is_empty() {
            return Err(TypeError::MalformedTaskId(s.to_string()));
        }
        Ok(Self {
            task_type: ty.parse()?,
            tx_id: id.to_string(),
        })
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.task_type, self.tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_uses_lowercase_type_prefix() {
        let key = TaskKey::new("abc", TaskType::BroadcastMeta);
        assert_eq!(key.to_string(), "broadcast_meta-abc");
    }

    #[test]
    fn parse_splits_on_first_dash_only() {
        let key = TaskKey::parse("sync-ab-cd-ef").unwrap();
        assert_eq!(key.task_type, TaskType::Sync);
        assert_eq!(key.tx_id, "ab-cd-ef");
    }

    #[test]
    fn parse_accepts_uppercase_type() {
        let key = TaskKey::parse("BROADCAST-xyz").unwrap();
        assert_eq!(key.task_type, TaskType::Broadcast);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(TaskKey::parse("sync"), Err(TypeError::MalformedTaskId(_))));
        assert!(matches!(TaskKey::parse("sync-"), Err(TypeError::MalformedTaskId(_))));
        assert!(matches!(TaskKey::parse("mine-abc"), Err(TypeError::UnknownTaskType(_))));
    }

    #[test]
    fn wire_names_have_no_separator() {
        for ty in TaskType::ALL {
            assert!(!ty.as_str().contains('-'));
            assert_eq!(ty.as_str().parse::<TaskType>().unwrap(), ty);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&TaskType::SyncManifest).unwrap();
        assert_eq!(json, "\"sync_manifest\"");
    }

    proptest! {
        #[test]
        fn any_base64url_id_survives_the_key_format(id in "[A-Za-z0-9_-]{1,64}", idx in 0usize..4) {
            let key = TaskKey::new(id.clone(), TaskType::ALL[idx]);
            let parsed = TaskKey::parse(&key.to_string()).unwrap();
            prop_assert_eq!(parsed, key);
        }
    }
}
