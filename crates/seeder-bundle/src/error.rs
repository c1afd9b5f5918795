/// Errors from decoding bundles and manifests.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Input ended before a field was complete.
    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("unknown signature type {0}")]
    UnknownSignatureType(u16),

    /// A header id disagrees with the id derived from the item's signature.
    #[error("item id mismatch: header {header}, derived {derived}")]
    IdMismatch { header: String, derived: String },

    /// Item sizes in the header do not add up to the bundle length.
    #[error("bundle length mismatch: headers claim {claimed} bytes, body has {actual}")]
    LengthMismatch { claimed: u64, actual: u64 },

    #[error("invalid tags: {0}")]
    InvalidTags(String),

    /// A presence byte other than 0 or 1.
    #[error("invalid presence flag {0}")]
    InvalidFlag(u8),

    /// A length or count does not fit in memory.
    #[error("{0} out of range")]
    OutOfRange(&'static str),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("manifest json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for bundle and manifest operations.
pub type BundleResult<T> = Result<T, BundleError>;
