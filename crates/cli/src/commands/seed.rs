//! Seed the database with reference data.
//!
//! Reads `companies.json`, `designators.json` and `parts.csv` from the data
//! directory and generates the standard storage bins. Seeding is idempotent:
//! existing records are matched by name or code and updated in place.

use std::path::Path;

use tracing::info;

use makerdb_server::db;
use makerdb_server::seed::{self, SeedOptions};

use super::{CommandError, database_url};

/// Seed the selected data sets from `data_dir`.
///
/// Selecting nothing seeds everything.
pub async fn run(options: SeedOptions, data_dir: &Path) -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!(data_dir = %data_dir.display(), "Loading seed data");

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let report = seed::seed(&pool, options, data_dir).await?;

    info!("Seeding complete!");
    info!("  Companies created: {}", report.companies);
    info!("  Designators created: {}", report.designators);
    info!("  Storage locations created: {}", report.storage);
    info!("  Parts created: {}", report.parts);
    info!("  Stock entries created: {}", report.stock);

    Ok(())
}
