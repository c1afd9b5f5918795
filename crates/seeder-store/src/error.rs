use crate::bucket::Bucket;

/// Errors from key/value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist in the bucket.
    #[error("not exist: {bucket}/{key}")]
    NotExist { bucket: Bucket, key: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store was written by an incompatible schema version.
    #[error("schema version mismatch: store has {found}, expected {expected}")]
    SchemaMismatch { found: String, expected: u32 },

    /// A batch journal failed its integrity check.
    #[error("corrupt batch journal: {0}")]
    CorruptJournal(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Invalid backend configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error from the embedded SQLite engine.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error from the object storage backend.
    #[error("object storage error: {0}")]
    Object(#[from] object_store::Error),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_exist(bucket: Bucket, key: impl Into<String>) -> Self {
        Self::NotExist {
            bucket,
            key: key.into(),
        }
    }

    /// Returns `true` for the distinguished not-found error.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
