//! Database operations for MakerDB `PostgreSQL`.
//!
//! ## Tables
//!
//! - `companies` - Manufacturers and vendors
//! - `designators` - Reference designator prefixes
//! - `attachments` + `*_attachments` - Files and their owner links
//! - `parts`, `part_substitutes`, `part_meta_members` - Parts catalogue
//! - `storage` - Storage location tree
//! - `lots`, `stock` - Inventory
//! - `projects`, `bom_items`, `bom_item_substitutes` - Projects and BOMs
//! - `orders`, `offers` - Procurement
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! makerdb migrate
//! ```
//!
//! Queries are built at runtime (`sqlx::query_as::<_, Row>`), so the crate
//! builds without a live database.

pub mod attachments;
pub mod companies;
pub mod dashboard;
pub mod designators;
pub mod lots;
pub mod parts;
pub mod procurement;
pub mod projects;
pub mod stock;
pub mod storage;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use makerdb_core::stock::StockError;

pub use attachments::AttachmentRepository;
pub use companies::CompanyRepository;
pub use dashboard::DashboardRepository;
pub use designators::DesignatorRepository;
pub use lots::LotRepository;
pub use parts::PartRepository;
pub use procurement::{OfferRepository, OrderRepository};
pub use projects::ProjectRepository;
pub use stock::StockRepository;
pub use storage::StorageRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate designator code, location still holds stock).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The request is well-formed but refers to something it may not use
    /// (e.g., a vendor that is not flagged as a vendor).
    #[error("invalid: {0}")]
    Invalid(String),

    /// A stock quantity rule was violated.
    #[error(transparent)]
    Stock(#[from] StockError),
}

/// Translate unique / foreign-key violations into [`RepositoryError::Conflict`].
///
/// `what` describes the operation for the error message, e.g. `"storage location"`.
pub(crate) fn map_constraint(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(format!(
                "{what} references or is referenced by another record"
            ));
        }
        if db_err.is_check_violation() {
            return RepositoryError::Invalid(format!("{what} violates a constraint"));
        }
    }
    RepositoryError::Database(err)
}

/// Offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
