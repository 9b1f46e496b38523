//! Aggregate queries for the dashboard.

use sqlx::PgPool;

use makerdb_core::stock::ValuedStock;

use super::{RepositoryError, StockRepository};
use crate::models::dashboard::DashboardSummary;

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline counts: parts, open orders and active projects.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self) -> Result<DashboardSummary, RepositoryError> {
        let (total_parts, open_orders, active_projects): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM parts),
                (SELECT COUNT(*) FROM orders WHERE status = 'open'),
                (SELECT COUNT(*) FROM projects WHERE status = 'active')
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardSummary {
            total_parts,
            open_orders,
            active_projects,
        })
    }

    /// Priced stock entries for valuation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn valuation_entries(&self) -> Result<Vec<ValuedStock>, RepositoryError> {
        StockRepository::new(self.pool).valuation_entries().await
    }
}
