//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! makerdb migrate
//! ```
//!
//! # Environment Variables
//!
//! - `MAKERDB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/server/migrations/` and are embedded at compile time.

use tracing::info;

use makerdb_server::db;

use super::{CommandError, database_url};

/// Apply all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
