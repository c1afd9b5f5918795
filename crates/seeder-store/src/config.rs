use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which [`KeyValueStore`](crate::KeyValueStore) implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Sqlite,
    Local,
    S3,
}

/// Storage configuration, the `[store]` table of the node config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file for `sqlite`, root directory for `local`.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_path(),
            s3: None,
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("./data/seeder.db")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Key prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}
