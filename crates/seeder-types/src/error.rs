use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid base64url string: {0}")]
    InvalidBase64(String),

    #[error("invalid size {0:?}: not a non-negative integer")]
    InvalidSize(String),

    #[error("invalid offset {0:?}: not a non-negative integer")]
    InvalidOffset(String),

    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("malformed task id: {0}")]
    MalformedTaskId(String),
}

pub type TypeResult<T> = Result<T, TypeError>;
