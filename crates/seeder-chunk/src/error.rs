use seeder_store::StoreError;
use seeder_types::TypeError;

/// Errors from chunking, offset accounting and chunk storage.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A zero-length payload cannot be chunked.
    #[error("payload is empty")]
    NullData,

    /// The computed chunk tree root differs from the declared data root.
    #[error("inconsistent data root: declared {declared}, computed {computed}")]
    InconsistentRoot { declared: String, computed: String },

    /// Declared size and actual payload length disagree.
    #[error("payload length {actual} does not match declared size {declared}")]
    SizeMismatch { declared: u64, actual: u64 },

    /// A chunk or offset entry is missing.
    #[error("not exist: {0}")]
    NotExist(String),

    /// A chunk's proof path does not verify against its data root.
    #[error("invalid proof path: {0}")]
    InvalidProof(String),

    /// The global offset counter would overflow.
    #[error("offset overflow adding {size} to {current}")]
    OffsetOverflow { current: u64, size: u64 },

    /// A stored record could not be decoded.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Malformed size, offset or encoding in the input.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Any other storage failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ChunkError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist(_))
    }

    /// Rejected input, as opposed to missing data or a storage fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NullData
                | Self::InconsistentRoot { .. }
                | Self::SizeMismatch { .. }
                | Self::InvalidProof(_)
                | Self::Type(_)
        )
    }
}

impl From<StoreError> for ChunkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotExist { bucket, key } => Self::NotExist(format!("{bucket}/{key}")),
            other => Self::Store(other),
        }
    }
}

/// Result alias for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
