use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use super::handler::{self, AppState};

/// Build the axum router with every bookmark endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::dump))
        .route("/api/v1/dump", get(handler::dump))
        .route("/api/v1/tags", get(handler::list_tags))
        .route("/api/v1/tags/:tag", get(handler::entries_by_tag))
        .route("/api/v1/find", get(handler::find))
        .route("/api/v1/create", post(handler::create))
        .route("/api/v1/save", get(handler::save).post(handler::save))
        .route("/api/v1/delete/:name", delete(handler::delete_entry))
        .route("/api/v1/stats", get(handler::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
