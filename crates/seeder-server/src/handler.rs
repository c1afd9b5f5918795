use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use seeder_node::{Node, Submission};
use seeder_task::Submitted;
use seeder_types::{Chunk, TaskKey, TaskType, TransactionMeta};

use crate::error::{ServerError, ServerResult};

const OCTET_STREAM: &str = "application/octet-stream";

/// Header naming the transaction a manifest path resolved to.
pub const RESOLVED_TX_HEADER: &str = "x-seeder-tx-id";

pub type AppState = Arc<Node>;

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(node): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let info = node.info().await?;
    Ok(Json(json!({
        "name": "seeder",
        "version": env!("CARGO_PKG_VERSION"),
        "node": info,
    })))
}

// ---- transactions and chunks ----

pub async fn post_tx(
    State(node): State<AppState>,
    Json(meta): Json<TransactionMeta>,
) -> ServerResult<Response> {
    let response = match node.submit_tx(meta).await? {
        Submission::Stored => (StatusCode::OK, "OK").into_response(),
        Submission::AlreadyExists => {
            (StatusCode::ALREADY_REPORTED, "Transaction already processed.").into_response()
        }
    };
    Ok(response)
}

pub async fn post_chunk(
    State(node): State<AppState>,
    Json(chunk): Json<Chunk>,
) -> ServerResult<Json<serde_json::Value>> {
    let offset = node.submit_chunk(&chunk).await?;
    Ok(Json(json!({ "offset": offset.to_string() })))
}

pub async fn get_tx(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<TransactionMeta>> {
    Ok(Json(node.get_tx(&id).await?))
}

pub async fn get_tx_offset(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(node.get_tx_offset(&id).await?))
}

pub async fn get_tx_data(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let meta = node.get_tx(&id).await?;
    let data = node.get_tx_data(&id).await?;
    Ok(raw(meta.content_type(), data))
}

pub async fn get_chunk(
    State(node): State<AppState>,
    Path(offset): Path<String>,
) -> ServerResult<Json<Chunk>> {
    let offset = offset
        .parse::<u64>()
        .map_err(|_| ServerError::BadRequest(format!("invalid offset {offset:?}")))?;
    Ok(Json(node.get_chunk(offset).await?))
}

// ---- bundles and manifests ----

pub async fn get_bundle_items(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(node.bundle_items(&id).await?))
}

pub async fn get_item(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    Ok(Json(node.get_item(&id).await?))
}

pub async fn get_item_data(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let meta = node.get_item(&id).await?;
    let data = node.get_item_data(&id).await?;
    Ok(raw(meta.content_type(), data))
}

pub async fn get_manifest_index(
    State(node): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    serve_manifest_path(&node, &id, "").await
}

pub async fn get_manifest_path(
    State(node): State<AppState>,
    Path((id, path)): Path<(String, String)>,
) -> ServerResult<Response> {
    serve_manifest_path(&node, &id, &path).await
}

async fn serve_manifest_path(node: &Node, id: &str, path: &str) -> ServerResult<Response> {
    let target = node.resolve_manifest(id, path).await?;
    let meta = node.get_tx(&target.tx_id).await?;
    let data = node.get_tx_data(&target.tx_id).await?;
    let mut response = raw(meta.content_type(), data);
    if let Ok(value) = target.tx_id.parse() {
        response
            .headers_mut()
            .insert(HeaderName::from_static(RESOLVED_TX_HEADER), value);
    }
    Ok(response)
}

// ---- tasks ----

pub async fn post_task(
    State(node): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ServerResult<impl IntoResponse> {
    let task_type: TaskType = kind.parse()?;
    let key = TaskKey::new(&id, task_type);
    let queued = node.submit_task(task_type, &id).await? == Submitted::Queued;
    let status = if queued { StatusCode::ACCEPTED } else { StatusCode::OK };
    Ok((status, Json(json!({ "task": key.to_string(), "queued": queued }))))
}

pub async fn get_task(
    State(node): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ServerResult<impl IntoResponse> {
    let key = TaskKey::new(id, kind.parse::<TaskType>()?);
    Ok(Json(node.task_status(&key).await?))
}

pub async fn delete_task(
    State(node): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let key = TaskKey::new(id, kind.parse::<TaskType>()?);
    node.cancel_task(&key)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- peers ----

pub async fn get_peers(State(node): State<AppState>) -> Json<Vec<String>> {
    Json(node.ranking().peers().as_ref().clone())
}

fn raw(content_type: Option<&str>, data: Vec<u8>) -> Response {
    let content_type = content_type
        .filter(|ct| ct.parse::<header::HeaderValue>().is_ok())
        .unwrap_or(OCTET_STREAM)
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], data).into_response()
}
