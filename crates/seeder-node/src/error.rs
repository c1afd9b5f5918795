use seeder_broadcast::BroadcastError;
use seeder_bundle::BundleError;
use seeder_chunk::ChunkError;
use seeder_peer::PeerError;
use seeder_store::StoreError;
use seeder_task::TaskError;
use seeder_types::TypeError;

/// Errors from node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The transaction failed verification.
    #[error("verification failed: {0}")]
    Verification(String),

    /// A record the operation needs is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transaction is not tagged as a path manifest.
    #[error("{0} is not a manifest")]
    NotManifest(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for NodeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotExist { bucket, key } => Self::NotFound(format!("{bucket}/{key}")),
            other => Self::Store(other),
        }
    }
}

impl NodeError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Chunk(e) => e.is_not_exist(),
            Self::Task(e) | Self::Broadcast(BroadcastError::Task(e)) => e.is_not_found(),
            _ => false,
        }
    }

    /// Rejected input. Never retried.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Verification(_) | Self::NotManifest(_) | Self::Bundle(_) | Self::Type(_) => true,
            Self::Chunk(e) => e.is_validation(),
            Self::Task(TaskError::Type(_)) => true,
            _ => false,
        }
    }

    /// The task registry is full; the caller may retry later.
    pub fn is_overload(&self) -> bool {
        matches!(
            self,
            Self::Task(TaskError::FullyLoaded { .. })
                | Self::Broadcast(BroadcastError::Task(TaskError::FullyLoaded { .. }))
        )
    }
}

/// Result alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
