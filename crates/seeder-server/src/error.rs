use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use seeder_node::NodeError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("store error: {0}")]
    Store(#[from] seeder_store::StoreError),

    #[error("peer error: {0}")]
    Peer(#[from] seeder_peer::PeerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<seeder_types::TypeError> for ServerError {
    fn from(err: seeder_types::TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Node(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            Self::Node(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Node(e) if e.is_overload() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(e) if e.is_not_exist() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use seeder_task::TaskError;
    use seeder_types::TaskKey;

    #[test]
    fn error_classes_map_to_status_codes() {
        let cases = [
            (ServerError::BadRequest("x".into()), 400),
            (NodeError::Verification("bad signature".into()).into(), 400),
            (NodeError::NotFound("tx".into()).into(), 404),
            (
                NodeError::Task(TaskError::NotFound(TaskKey::parse("sync-abc").unwrap())).into(),
                404,
            ),
            (NodeError::Task(TaskError::FullyLoaded { capacity: 1 }).into(), 503),
            (NodeError::Serialization("oops".into()).into(), 500),
            (ServerError::Internal("boom".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err}");
        }
    }
}
