/// Errors from talking to peers.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Connection, timeout or protocol failure.
    #[error("request to {peer} failed: {source}")]
    Request {
        peer: String,
        #[source]
        source: reqwest::Error,
    },

    /// The peer answered with a non-success status.
    #[error("{peer} answered {code}: {body}")]
    Status { peer: String, code: u16, body: String },

    /// The peer does not have the requested transaction or payload.
    #[error("{peer} has no {what}")]
    NotFound { peer: String, what: String },

    /// The response body could not be decoded.
    #[error("bad response from {peer}: {reason}")]
    Decode { peer: String, reason: String },

    /// The HTTP client could not be built.
    #[error("client setup failed: {0}")]
    Client(String),
}

impl PeerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for peer operations.
pub type PeerResult<T> = Result<T, PeerError>;
