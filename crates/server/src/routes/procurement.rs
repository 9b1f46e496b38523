//! Procurement route handlers: purchase orders and vendor offers.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use makerdb_core::{OfferId, OrderId, PriceError, quote};

use super::extract::{Json, Pagination, Path, Query};
use crate::db::{OfferRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::models::ValidationError;
use crate::models::procurement::{
    CreateOfferInput, CreateOrderInput, Offer, OfferFilter, OfferQuote, Order, OrderFilter,
    QuoteQuery, ReceiveOrderInput, ReceivedOrder, UpdateOfferInput, UpdateOrderInput,
};
use crate::state::AppState;

// =============================================================================
// Orders
// =============================================================================

/// GET /procurement/orders?status&vendor_id
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    let page = pagination.page()?;
    Ok(Json(OrderRepository::new(state.pool()).list(&filter, page).await?))
}

/// GET /procurement/orders/{id}
pub async fn show_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// POST /procurement/orders
#[instrument(skip(state, input), fields(vendor_id = %input.vendor_id))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<Order>)> {
    input.validate()?;
    let order = OrderRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /procurement/orders/{id}
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(input): Json<UpdateOrderInput>,
) -> Result<Json<Order>> {
    input.validate()?;
    Ok(Json(OrderRepository::new(state.pool()).update(id, &input).await?))
}

/// DELETE /procurement/orders/{id}
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    OrderRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /procurement/orders/{id}/receive
///
/// Books the delivered lines into stock under a new lot and marks the order
/// received. Receiving twice is a 409.
#[instrument(skip(state, input), fields(lines = input.lines.len()))]
pub async fn receive_order(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(input): Json<ReceiveOrderInput>,
) -> Result<Json<ReceivedOrder>> {
    input.validate()?;
    Ok(Json(
        OrderRepository::new(state.pool()).receive(id, &input).await?,
    ))
}

// =============================================================================
// Offers
// =============================================================================

/// GET /procurement/offers?part_id&vendor_id
pub async fn list_offers(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<OfferFilter>,
) -> Result<Json<Vec<Offer>>> {
    let page = pagination.page()?;
    Ok(Json(OfferRepository::new(state.pool()).list(&filter, page).await?))
}

async fn require_offer(state: &AppState, id: OfferId) -> Result<Offer> {
    OfferRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Offer".to_string()))
}

/// GET /procurement/offers/{id}
pub async fn show_offer(
    State(state): State<AppState>,
    Path(id): Path<OfferId>,
) -> Result<Json<Offer>> {
    Ok(Json(require_offer(&state, id).await?))
}

/// POST /procurement/offers
#[instrument(skip(state, input), fields(part_id = ?input.part_id))]
pub async fn create_offer(
    State(state): State<AppState>,
    Json(input): Json<CreateOfferInput>,
) -> Result<(StatusCode, Json<Offer>)> {
    input.validate()?;
    let offer = OfferRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// PUT /procurement/offers/{id}
pub async fn update_offer(
    State(state): State<AppState>,
    Path(id): Path<OfferId>,
    Json(input): Json<UpdateOfferInput>,
) -> Result<Json<Offer>> {
    input.validate()?;
    Ok(Json(OfferRepository::new(state.pool()).update(id, &input).await?))
}

/// DELETE /procurement/offers/{id}
pub async fn delete_offer(
    State(state): State<AppState>,
    Path(id): Path<OfferId>,
) -> Result<StatusCode> {
    OfferRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /procurement/offers/{id}/quote?quantity=N&currency=XXX
///
/// Rounds the quantity up to the offer's MOQ and order multiple and picks
/// the cheapest price structure. Offers priced in several currencies need
/// `currency`.
#[instrument(skip(state))]
pub async fn quote_offer(
    State(state): State<AppState>,
    Path(id): Path<OfferId>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<OfferQuote>> {
    if query.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }
    let offer = require_offer(&state, id).await?;
    let quote = quote(
        &offer.prices,
        query.currency.as_deref(),
        query.quantity,
        offer.moq,
        offer.order_multiple,
    )
    .map_err(|e| match e {
        PriceError::MixedCurrencies(_) | PriceError::InvalidCurrency(_) => {
            ValidationError::new("currency", e.to_string())
        }
        PriceError::InvalidQuantity(_) | PriceError::Overflow => {
            ValidationError::new("quantity", e.to_string())
        }
    })?;

    Ok(Json(OfferQuote {
        offer_id: id,
        quote,
    }))
}

/// Create the procurement routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(show_order).put(update_order).delete(delete_order),
        )
        .route("/orders/{id}/receive", post(receive_order))
        .route("/offers", get(list_offers).post(create_offer))
        .route(
            "/offers/{id}",
            get(show_offer).put(update_offer).delete(delete_offer),
        )
        .route("/offers/{id}/quote", get(quote_offer))
}
