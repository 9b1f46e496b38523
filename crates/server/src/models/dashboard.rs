//! Dashboard aggregates.

use std::collections::BTreeMap;

use serde::Serialize;

/// Headline counts.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_parts: i64,
    pub open_orders: i64,
    pub active_projects: i64,
}

/// Inventory valuation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Value of on-hand stock in `currency`.
    pub inventory_value: f64,
    pub currency: String,
    /// Daily values for the last week. Stock history is not recorded, so
    /// these are always zero.
    pub value_trends: [i64; 7],
    /// Value of on-hand stock per currency.
    pub by_currency: BTreeMap<String, f64>,
}
