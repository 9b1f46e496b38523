//! Subcommand implementations.

pub mod migrate;
pub mod reindex;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Seeding failed.
    #[error(transparent)]
    Seed(#[from] makerdb_server::seed::SeedError),

    /// The API server could not be reached or rejected the request.
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Read the database URL, falling back to the generic `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("MAKERDB_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("MAKERDB_DATABASE_URL"))
}
