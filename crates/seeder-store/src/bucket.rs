use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::traits::KeyValueStore;

/// Version of the bucket layout. Bump when a bucket's key or value encoding
/// changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Well-known keys in [`Bucket::Constants`].
pub mod keys {
    /// Global running total of all admitted payload sizes.
    pub const ALL_DATA_END_OFFSET: &str = "all-data-end-offset";
    /// Schema version the store was created with.
    pub const SCHEMA_VERSION: &str = "schema-version";
}

/// Namespace of a key in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    /// Singleton values (global offset counter, schema version).
    Constants,
    /// Transaction id -> transaction record without inline data.
    TxMeta,
    /// `{data_root}-{data_size}` -> exclusive end offset.
    TxDataEndOffset,
    /// Absolute chunk start offset -> chunk.
    Chunk,
    /// `{type}-{tx_id}` -> persisted task snapshot.
    Task,
    /// `{type}-{tx_id}` -> durable marker for unfinished work.
    PendingPool,
    /// Bundle item id -> item record.
    BundleItemMeta,
    /// Bundle item id -> raw item bytes.
    BundleItemBinary,
    /// Bundle transaction id -> list of item ids.
    BundleItems,
    /// Peer address -> ranking weight.
    PeerWeight,
}

impl Bucket {
    pub const ALL: [Bucket; 10] = [
        Self::Constants,
        Self::TxMeta,
        Self::TxDataEndOffset,
        Self::Chunk,
        Self::Task,
        Self::PendingPool,
        Self::BundleItemMeta,
        Self::BundleItemBinary,
        Self::BundleItems,
        Self::PeerWeight,
    ];

    /// Stable storage name of the bucket.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constants => "constants",
            Self::TxMeta => "tx-meta",
            Self::TxDataEndOffset => "tx-data-end-offset",
            Self::Chunk => "chunk",
            Self::Task => "task",
            Self::PendingPool => "pending-pool",
            Self::BundleItemMeta => "bundle-item-meta",
            Self::BundleItemBinary => "bundle-item-binary",
            Self::BundleItems => "bundle-items",
            Self::PeerWeight => "peer-weight",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record the schema version on a fresh store, or check it on an existing one.
pub async fn ensure_schema(store: &dyn KeyValueStore) -> StoreResult<()> {
    match store.get(Bucket::Constants, keys::SCHEMA_VERSION).await {
        Ok(raw) => {
            let found = String::from_utf8_lossy(&raw).into_owned();
            if found.trim() != SCHEMA_VERSION.to_string() {
                return Err(StoreError::SchemaMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
            Ok(())
        }
        Err(e) if e.is_not_exist() => {
            store
                .put(
                    Bucket::Constants,
                    keys::SCHEMA_VERSION,
                    SCHEMA_VERSION.to_string().as_bytes(),
                )
                .await?;
            info!(version = SCHEMA_VERSION, backend = store.kind(), "initialized store schema");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
