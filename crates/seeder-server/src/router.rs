use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with every seeder endpoint.
pub fn build_router(node: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/tx", post(handler::post_tx))
        .route("/chunk", post(handler::post_chunk))
        .route("/tx/:id", get(handler::get_tx))
        .route("/unconfirmed_tx/:id", get(handler::get_tx))
        .route("/tx/:id/offset", get(handler::get_tx_offset))
        .route("/tx/:id/data", get(handler::get_tx_data))
        .route("/chunk/:offset", get(handler::get_chunk))
        .route("/bundle/:id/items", get(handler::get_bundle_items))
        .route("/item/:id", get(handler::get_item))
        .route("/item/:id/data", get(handler::get_item_data))
        .route("/manifest/:id", get(handler::get_manifest_index))
        .route("/manifest/:id/*path", get(handler::get_manifest_path))
        .route(
            "/task/:kind/:id",
            post(handler::post_task)
                .get(handler::get_task)
                .delete(handler::delete_task),
        )
        .route("/peers", get(handler::get_peers))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}
