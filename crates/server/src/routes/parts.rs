//! Part route handlers.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde_json::{Value, json};
use tracing::instrument;

use makerdb_core::PartId;
use makerdb_core::stock::{on_hand_total, stock_level};

use super::extract::{Json, Pagination, Path, Query};
use crate::db::{OfferRepository, PartRepository, StockRepository};
use crate::error::{AppError, Result};
use crate::models::part::{CreatePartInput, Part, PartFilter, PartStock, UpdatePartInput};
use crate::models::procurement::{Offer, OfferFilter};
use crate::state::AppState;

async fn require_part(state: &AppState, id: PartId) -> Result<Part> {
    PartRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Part".to_string()))
}

/// GET /parts
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<PartFilter>,
) -> Result<Json<Vec<Part>>> {
    let page = pagination.page()?;
    Ok(Json(PartRepository::new(state.pool()).list(&filter, page).await?))
}

/// GET /parts/count
#[instrument(skip(state))]
pub async fn count(
    State(state): State<AppState>,
    Query(filter): Query<PartFilter>,
) -> Result<Json<Value>> {
    let count = PartRepository::new(state.pool()).count(&filter).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /parts/low-stock
///
/// Parts with a threshold whose on-hand stock is at or below it.
#[instrument(skip(state))]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Part>>> {
    let page = pagination.page()?;
    Ok(Json(PartRepository::new(state.pool()).low_stock(page).await?))
}

/// GET /parts/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<PartId>) -> Result<Json<Part>> {
    Ok(Json(require_part(&state, id).await?))
}

/// POST /parts
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreatePartInput>,
) -> Result<(StatusCode, Json<Part>)> {
    input.validate()?;
    let part = PartRepository::new(state.pool()).create(&input).await?;
    state.search_sync().upsert(&part);
    Ok((StatusCode::CREATED, Json(part)))
}

/// PUT /parts/{id}
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
    Json(input): Json<UpdatePartInput>,
) -> Result<Json<Part>> {
    input.validate()?;
    let part = PartRepository::new(state.pool()).update(id, &input).await?;
    state.search_sync().upsert(&part);
    Ok(Json(part))
}

/// DELETE /parts/{id}
///
/// Stock, offers and substitute links go with the part. Fails with 409
/// while a project BOM uses it.
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<PartId>) -> Result<StatusCode> {
    PartRepository::new(state.pool()).delete(id).await?;
    state.search_sync().delete(id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /parts/{id}/stock
#[instrument(skip(state))]
pub async fn stock(State(state): State<AppState>, Path(id): Path<PartId>) -> Result<Json<PartStock>> {
    let part = require_part(&state, id).await?;
    let entries = StockRepository::new(state.pool()).list_for_part(id).await?;

    let total_on_hand = on_hand_total(entries.iter().map(|e| (e.quantity, e.status)));
    Ok(Json(PartStock {
        part_id: id,
        total_on_hand,
        low_stock_threshold: part.low_stock_threshold,
        level: stock_level(total_on_hand, part.low_stock_threshold),
        entries,
    }))
}

// =============================================================================
// Substitutes
// =============================================================================

/// GET /parts/{id}/substitutes
pub async fn substitutes(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
) -> Result<Json<Vec<Part>>> {
    require_part(&state, id).await?;
    Ok(Json(PartRepository::new(state.pool()).substitutes(id).await?))
}

/// PUT /parts/{id}/substitutes/{other}
///
/// Substitution is symmetric.
pub async fn add_substitute(
    State(state): State<AppState>,
    Path((id, other)): Path<(PartId, PartId)>,
) -> Result<StatusCode> {
    PartRepository::new(state.pool()).add_substitute(id, other).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /parts/{id}/substitutes/{other}
pub async fn remove_substitute(
    State(state): State<AppState>,
    Path((id, other)): Path<(PartId, PartId)>,
) -> Result<StatusCode> {
    PartRepository::new(state.pool())
        .remove_substitute(id, other)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Meta-part members
// =============================================================================

/// GET /parts/{id}/members
pub async fn members(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
) -> Result<Json<Vec<Part>>> {
    require_part(&state, id).await?;
    Ok(Json(PartRepository::new(state.pool()).members(id).await?))
}

/// PUT /parts/{id}/members/{member}
pub async fn add_member(
    State(state): State<AppState>,
    Path((id, member)): Path<(PartId, PartId)>,
) -> Result<StatusCode> {
    PartRepository::new(state.pool()).add_member(id, member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /parts/{id}/members/{member}
pub async fn remove_member(
    State(state): State<AppState>,
    Path((id, member)): Path<(PartId, PartId)>,
) -> Result<StatusCode> {
    PartRepository::new(state.pool())
        .remove_member(id, member)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /parts/{id}/offers
pub async fn offers(
    State(state): State<AppState>,
    Path(id): Path<PartId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Offer>>> {
    let page = pagination.page()?;
    require_part(&state, id).await?;
    let filter = OfferFilter {
        part_id: Some(id),
        vendor_id: None,
    };
    Ok(Json(OfferRepository::new(state.pool()).list(&filter, page).await?))
}

/// Create the part routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/count", get(count))
        .route("/low-stock", get(low_stock))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/stock", get(stock))
        .route("/{id}/substitutes", get(substitutes))
        .route(
            "/{id}/substitutes/{other}",
            put(add_substitute).delete(remove_substitute),
        )
        .route("/{id}/members", get(members))
        .route("/{id}/members/{member}", put(add_member).delete(remove_member))
        .route("/{id}/offers", get(offers))
}
