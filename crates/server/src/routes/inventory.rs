//! Inventory route handlers: storage locations, lots and stock entries.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use makerdb_core::{LotId, StockId, StorageId};

use super::extract::{Json, Pagination, Path, Query};
use crate::db::{LotRepository, StockRepository, StorageRepository};
use crate::error::{AppError, Result};
use crate::models::lot::{CreateLotInput, Lot, LotFilter, UpdateLotInput};
use crate::models::stock::{
    AdjustStockInput, CreateStockInput, MoveStockInput, MoveStockResult, Stock, StockFilter,
    UpdateStockInput,
};
use crate::models::storage::{
    CreateStorageInput, Storage, StorageFilter, StorageOccupancy, UpdateStorageInput,
};
use crate::state::AppState;

// =============================================================================
// Storage locations
// =============================================================================

/// GET /inventory/locations?parent_id
#[instrument(skip(state))]
pub async fn list_locations(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<StorageFilter>,
) -> Result<Json<Vec<Storage>>> {
    let page = pagination.page()?;
    Ok(Json(
        StorageRepository::new(state.pool()).list(&filter, page).await?,
    ))
}

/// GET /inventory/locations/occupancy
#[instrument(skip(state))]
pub async fn occupancy(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<StorageOccupancy>>> {
    let page = pagination.page()?;
    Ok(Json(StorageRepository::new(state.pool()).occupancy(page).await?))
}

/// GET /inventory/locations/{id}
pub async fn show_location(
    State(state): State<AppState>,
    Path(id): Path<StorageId>,
) -> Result<Json<Storage>> {
    StorageRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Storage location".to_string()))
}

/// POST /inventory/locations
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create_location(
    State(state): State<AppState>,
    Json(input): Json<CreateStorageInput>,
) -> Result<(StatusCode, Json<Storage>)> {
    input.validate()?;
    let storage = StorageRepository::new(state.pool()).create(&input).await?;
    state.search_sync().upsert(&storage);
    Ok((StatusCode::CREATED, Json(storage)))
}

/// PUT /inventory/locations/{id}
///
/// Re-parenting a location under itself or one of its descendants is a 400.
#[instrument(skip(state, input))]
pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<StorageId>,
    Json(input): Json<UpdateStorageInput>,
) -> Result<Json<Storage>> {
    input.validate()?;
    let storage = StorageRepository::new(state.pool()).update(id, &input).await?;
    state.search_sync().upsert(&storage);
    Ok(Json(storage))
}

/// DELETE /inventory/locations/{id}
///
/// Fails with 409 while the location still holds stock.
#[instrument(skip(state))]
pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<StorageId>,
) -> Result<StatusCode> {
    StorageRepository::new(state.pool()).delete(id).await?;
    state.search_sync().delete(id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /inventory/locations/{id}/stock
#[instrument(skip(state))]
pub async fn location_stock(
    State(state): State<AppState>,
    Path(id): Path<StorageId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Stock>>> {
    let page = pagination.page()?;
    if StorageRepository::new(state.pool()).get(id).await?.is_none() {
        return Err(AppError::NotFound("Storage location".to_string()));
    }
    let filter = StockFilter {
        storage_id: Some(id),
        ..StockFilter::default()
    };
    Ok(Json(StockRepository::new(state.pool()).list(&filter, page).await?))
}

// =============================================================================
// Lots
// =============================================================================

/// GET /inventory/lots?order_id
pub async fn list_lots(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<LotFilter>,
) -> Result<Json<Vec<Lot>>> {
    let page = pagination.page()?;
    Ok(Json(LotRepository::new(state.pool()).list(&filter, page).await?))
}

/// GET /inventory/lots/{id}
pub async fn show_lot(State(state): State<AppState>, Path(id): Path<LotId>) -> Result<Json<Lot>> {
    LotRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Lot".to_string()))
}

/// POST /inventory/lots
pub async fn create_lot(
    State(state): State<AppState>,
    Json(input): Json<CreateLotInput>,
) -> Result<(StatusCode, Json<Lot>)> {
    input.validate()?;
    let lot = LotRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

/// PUT /inventory/lots/{id}
pub async fn update_lot(
    State(state): State<AppState>,
    Path(id): Path<LotId>,
    Json(input): Json<UpdateLotInput>,
) -> Result<Json<Lot>> {
    input.validate()?;
    Ok(Json(LotRepository::new(state.pool()).update(id, &input).await?))
}

/// DELETE /inventory/lots/{id}
pub async fn delete_lot(State(state): State<AppState>, Path(id): Path<LotId>) -> Result<StatusCode> {
    LotRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Stock entries
// =============================================================================

/// GET /inventory/stock?part_id&storage_id&lot_id&status&on_hand
#[instrument(skip(state))]
pub async fn list_stock(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<StockFilter>,
) -> Result<Json<Vec<Stock>>> {
    let page = pagination.page()?;
    Ok(Json(StockRepository::new(state.pool()).list(&filter, page).await?))
}

/// GET /inventory/stock/{id}
pub async fn show_stock(
    State(state): State<AppState>,
    Path(id): Path<StockId>,
) -> Result<Json<Stock>> {
    StockRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Stock entry".to_string()))
}

/// POST /inventory/stock
#[instrument(skip(state, input), fields(part_id = %input.part_id, storage_id = %input.storage_id))]
pub async fn create_stock(
    State(state): State<AppState>,
    Json(input): Json<CreateStockInput>,
) -> Result<(StatusCode, Json<Stock>)> {
    input.validate()?;
    let stock = StockRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(stock)))
}

/// PUT /inventory/stock/{id}
#[instrument(skip(state, input))]
pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<StockId>,
    Json(input): Json<UpdateStockInput>,
) -> Result<Json<Stock>> {
    input.validate()?;
    Ok(Json(StockRepository::new(state.pool()).update(id, &input).await?))
}

/// DELETE /inventory/stock/{id}
pub async fn delete_stock(
    State(state): State<AppState>,
    Path(id): Path<StockId>,
) -> Result<StatusCode> {
    StockRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inventory/stock/{id}/adjust
///
/// Applies a signed delta; results below zero are rejected.
#[instrument(skip(state))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<StockId>,
    Json(input): Json<AdjustStockInput>,
) -> Result<Json<Stock>> {
    Ok(Json(
        StockRepository::new(state.pool()).adjust(id, input.delta).await?,
    ))
}

/// POST /inventory/stock/{id}/move
#[instrument(skip(state))]
pub async fn move_stock(
    State(state): State<AppState>,
    Path(id): Path<StockId>,
    Json(input): Json<MoveStockInput>,
) -> Result<Json<MoveStockResult>> {
    if input.quantity.is_some_and(|q| q <= 0) {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }
    Ok(Json(
        StockRepository::new(state.pool()).move_entry(id, &input).await?,
    ))
}

/// Create the inventory routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route("/locations/occupancy", get(occupancy))
        .route(
            "/locations/{id}",
            get(show_location).put(update_location).delete(delete_location),
        )
        .route("/locations/{id}/stock", get(location_stock))
        .route("/lots", get(list_lots).post(create_lot))
        .route("/lots/{id}", get(show_lot).put(update_lot).delete(delete_lot))
        .route("/stock", get(list_stock).post(create_stock))
        .route(
            "/stock/{id}",
            get(show_stock).put(update_stock).delete(delete_stock),
        )
        .route("/stock/{id}/adjust", post(adjust_stock))
        .route("/stock/{id}/move", post(move_stock))
}
