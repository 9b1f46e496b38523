//! Search route handlers.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;
use uuid::Uuid;

use super::extract::{Json, Query};
use crate::error::{AppError, Result};
use crate::search::{Collection, SearchHit, rebuild};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    /// Only direct children of this location (locations only).
    pub parent_id: Option<Uuid>,
}

impl SearchQuery {
    fn limit(&self) -> Result<usize> {
        match self.limit.unwrap_or(DEFAULT_LIMIT) {
            limit @ 1..=MAX_LIMIT => Ok(limit),
            _ => Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            ))),
        }
    }
}

/// Search results.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

/// GET /search/locations?q&limit&parent_id
#[instrument(skip(state))]
pub async fn locations(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let limit = query.limit()?;
    let hits = state
        .search()
        .search(Collection::Storage, query.q.trim(), query.parent_id, limit)?;
    Ok(Json(SearchResponse { hits }))
}

/// GET /search/locations/suggestions?q&limit
#[instrument(skip(state))]
pub async fn location_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let limit = query.limit()?;
    let suggestions = state
        .search()
        .suggest(Collection::Storage, query.q.trim(), limit)?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

/// GET /search/parts?q&limit
#[instrument(skip(state))]
pub async fn parts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let limit = query.limit()?;
    let hits = state
        .search()
        .search(Collection::Parts, query.q.trim(), None, limit)?;
    Ok(Json(SearchResponse { hits }))
}

/// POST /search/reindex
///
/// Rebuilds the whole index from the database and waits for it to finish.
#[instrument(skip(state))]
pub async fn reindex(State(state): State<AppState>) -> Result<Json<Value>> {
    let indexed = rebuild(state.pool(), state.search()).await?;
    tracing::info!(indexed, "Search index rebuilt on request");
    Ok(Json(json!({ "indexed": indexed })))
}

/// Create the search routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locations", get(locations))
        .route("/locations/suggestions", get(location_suggestions))
        .route("/parts", get(parts))
        .route("/reindex", post(reindex))
}
