use std::collections::HashMap;

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::{
    entry::{Entry, EntryDraft, split_tags},
    runtime::handle::StoreHandle,
};

use super::error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the store runtime.
    pub handle: StoreHandle,
}

/// Query parameters accepted by [`find`].
#[derive(Debug, Default, Deserialize)]
pub struct FindQuery {
    /// Exact entry name.
    pub name: Option<String>,
    /// Exact URL.
    pub url: Option<String>,
    /// Comma-separated tag list.
    pub tag: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Every entry in canonical order.
pub async fn dump(State(state): State<AppState>) -> Result<Json<Vec<Entry>>, ApiError> {
    Ok(Json(state.handle.dump().await?))
}

/// Sorted list of known tags.
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.handle.tags().await?))
}

/// Entries under a single tag.
pub async fn entries_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let hits = state.handle.find_by_tags(vec![tag.clone()]).await?;
    if hits.is_empty() {
        warn!(%tag, "no such tag");
        return Err(ApiError::NotFound(format!("{tag}: no such tag")));
    }
    Ok(Json(hits))
}

/// Lookup by `name`, else `url`, else comma-separated `tag`.
pub async fn find(
    State(state): State<AppState>,
    Query(query): Query<FindQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    if let Some(name) = non_empty(query.name) {
        return Ok(Json(vec![state.handle.find_by_name(name).await?]));
    }
    if let Some(url) = non_empty(query.url) {
        return Ok(Json(vec![state.handle.find_by_url(url).await?]));
    }
    if let Some(tag) = non_empty(query.tag) {
        let hits = state.handle.find_by_tags(split_tags(&tag)).await?;
        if hits.is_empty() {
            return Err(ApiError::NotFound(format!("{tag}: not found")));
        }
        return Ok(Json(hits));
    }
    Err(ApiError::BadRequest(
        "One of url, tag, name param missing".to_string(),
    ))
}

/// Creates an entry from form fields `name`, `url` and `tags`.
pub async fn create(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let field = |key: &str| params.get(key).map(String::as_str).unwrap_or("");
    let draft = EntryDraft::from_parts(field("name"), field("url"), field("tags"))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let entry = state.handle.add(draft).await?;
    Ok(format!("created {}", entry.name))
}

/// Deletes an entry by name.
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    state.handle.delete(name.clone()).await?;
    Ok(format!("{name} deleted"))
}

/// Writes a snapshot synchronously.
pub async fn save(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.handle.save().await {
        Ok(report) => {
            info!(save_count = report.save_count, "manual save completed");
            (StatusCode::OK, "data persisted successfully\n")
        }
        Err(err) => {
            error!(%err, "manual save failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to persist data\n")
        }
    }
}

/// Entry count and the last save metadata.
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let size = state.handle.size().await?;
    Ok(Json(json!({
        "size": size,
        "last_save": state.handle.last_save(),
    })))
}
