use std::sync::Arc;

use tracing::info;

use crate::bucket::ensure_schema;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryStore;
use crate::object::ObjectKvStore;
use crate::sqlite::SqliteStore;
use crate::traits::KeyValueStore;

/// Open the configured backend and check its schema version.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
        StoreBackend::Local => Arc::new(ObjectKvStore::local(&config.path).await?),
        StoreBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StoreError::Config("backend = \"s3\" requires an [store.s3] table".into()))?;
            Arc::new(ObjectKvStore::s3(s3).await?)
        }
    };
    ensure_schema(store.as_ref()).await?;
    info!(backend = store.kind(), "store opened");
    Ok(store)
}
