//! Dashboard route handlers.

use axum::{Router, extract::State, routing::get};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::instrument;

use makerdb_core::stock::inventory_value;

use super::extract::Json;
use crate::db::DashboardRepository;
use crate::error::Result;
use crate::models::dashboard::{DashboardStats, DashboardSummary};
use crate::state::AppState;

/// GET /dashboard/summary
#[instrument(skip(state))]
pub async fn summary(State(state): State<AppState>) -> Result<Json<DashboardSummary>> {
    Ok(Json(DashboardRepository::new(state.pool()).summary().await?))
}

/// GET /dashboard/stats
///
/// Values on-hand stock at its unit price. `inventoryValue` is the total in
/// the configured default currency; other currencies are only reported in
/// `byCurrency`.
#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    let currency = state.config().default_currency.clone();
    let entries = DashboardRepository::new(state.pool())
        .valuation_entries()
        .await?;
    let totals = inventory_value(&entries, &currency);

    let inventory_value = to_f64(totals.get(&currency).copied().unwrap_or(Decimal::ZERO));
    let by_currency = totals
        .into_iter()
        .map(|(code, value)| (code, to_f64(value)))
        .collect();

    Ok(Json(DashboardStats {
        inventory_value,
        currency,
        value_trends: [0; 7],
        by_currency,
    }))
}

fn to_f64(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or_default()
}

/// Create the dashboard routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/stats", get(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_f64_rounds_to_cents() {
        assert!((to_f64(Decimal::new(12_346, 3)) - 12.35).abs() < f64::EPSILON);
        assert!(to_f64(Decimal::ZERO).abs() < f64::EPSILON);
    }
}
