//! Rebuild the search index of a running server.
//!
//! The index lives in the server's memory, so the rebuild is requested over
//! HTTP rather than performed here.

use serde_json::Value;
use tracing::info;

use super::CommandError;

/// Ask the server at `api_url` to rebuild its search index.
pub async fn run(api_url: &str) -> Result<(), CommandError> {
    let url = format!("{}/search/reindex", api_url.trim_end_matches('/'));

    info!(%url, "Requesting search reindex");

    let body: Value = reqwest::Client::new()
        .post(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let indexed = body.get("indexed").and_then(Value::as_u64).unwrap_or(0);
    info!(indexed, "Search index rebuilt");

    Ok(())
}
