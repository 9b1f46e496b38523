//! Full index rebuild from the database.

use sqlx::PgPool;
use tracing::{error, info, instrument};

use crate::db::{PartRepository, StorageRepository};

use super::{IndexDocument, SearchError, SearchIndex};

/// Spawn a background task that rebuilds the search index.
///
/// Until the first rebuild finishes, searches only see documents written
/// through [`super::SearchSync`] since startup.
pub fn rebuild_in_background(pool: PgPool, index: SearchIndex) {
    info!("Spawning background search index build task");
    tokio::spawn(async move {
        match rebuild(&pool, &index).await {
            Ok(docs) => info!(docs, "Search index is now ready and serving requests"),
            Err(e) => error!(error = %e, "Failed to build search index"),
        }
    });
}

/// Reload every storage location and part into the index.
///
/// Returns the number of indexed documents.
///
/// # Errors
///
/// Returns `SearchError::Build` if loading from the database fails, or
/// `SearchError::Index` if writing the index fails.
#[instrument(skip_all)]
pub async fn rebuild(pool: &PgPool, index: &SearchIndex) -> Result<usize, SearchError> {
    let storage = StorageRepository::new(pool)
        .list_all()
        .await
        .map_err(|e| SearchError::Build(format!("Failed to load storage: {e}")))?;
    let parts = PartRepository::new(pool)
        .list_all()
        .await
        .map_err(|e| SearchError::Build(format!("Failed to load parts: {e}")))?;
    info!(storage = storage.len(), parts = parts.len(), "Indexing records");

    let docs: Vec<IndexDocument> = storage
        .iter()
        .map(IndexDocument::from)
        .chain(parts.iter().map(IndexDocument::from))
        .collect();
    let count = docs.len();

    let index = index.clone();
    tokio::task::spawn_blocking(move || index.replace_all(&docs))
        .await
        .map_err(|e| SearchError::Build(format!("Index task failed: {e}")))??;

    Ok(count)
}
