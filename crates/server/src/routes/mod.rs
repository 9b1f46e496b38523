//! HTTP route handlers for the MakerDB REST API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database reachability
//!
//! /companies     - Manufacturers and vendors
//! /designators   - Reference designator prefixes
//! /attachments   - Files and their owner links
//! /parts         - Parts, stock summary, substitutes, meta members, offers
//! /inventory     - Storage locations, lots, stock entries (adjust, move)
//! /projects      - Projects, BOM lines, build availability
//! /procurement   - Purchase orders (receive) and vendor offers (quote)
//! /dashboard     - Summary counts and inventory valuation
//! /search        - Location and part search, index rebuild
//! ```
//!
//! All bodies are JSON. Errors are `{"detail": "..."}` with 400, 404, 409
//! or 500. List endpoints take `skip` (default 0) and `limit` (1 to 1000,
//! default 100).

pub mod attachments;
pub mod companies;
pub mod dashboard;
pub mod designators;
pub mod extract;
pub mod inventory;
pub mod parts;
pub mod procurement;
pub mod projects;
pub mod search;

use axum::{
    Json,
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /health/ready
///
/// 503 when the database cannot be reached.
pub async fn ready(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => Json(json!({
            "status": "ok",
            "search_ready": state.search().is_ready(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .nest("/companies", companies::router())
        .nest("/designators", designators::router())
        .nest("/attachments", attachments::router())
        .nest("/parts", parts::router())
        .nest("/inventory", inventory::router())
        .nest("/projects", projects::router())
        .nest("/procurement", procurement::router())
        .nest("/dashboard", dashboard::router())
        .nest("/search", search::router())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::search::{SearchIndex, SearchSync};

    /// App with a pool that never connects; only routes that reject input
    /// before touching the database can be exercised.
    fn app() -> Router {
        let config = ServerConfig::from_lookup(|key| {
            (key == "MAKERDB_DATABASE_URL").then(|| "postgres://localhost/makerdb".to_string())
        })
        .expect("config");
        let pool = PgPoolOptions::new()
            .connect_lazy(config.database_url())
            .expect("lazy pool");
        let index = SearchIndex::new().expect("index");
        let (sync, _worker) = SearchSync::spawn(index.clone());
        routes().with_state(AppState::new(config, pool, index, sync))
    }

    async fn send(method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_pagination_is_validated() {
        let (status, body) = send(Method::GET, "/companies?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|d| d.contains("limit")));

        let (status, _) = send(Method::GET, "/parts?skip=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(Method::GET, "/inventory/stock?limit=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let (status, body) = send(Method::GET, "/parts/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_fields() {
        let uri = format!("/parts/{}", uuid::Uuid::new_v4());
        let (status, body) = send(Method::PUT, &uri, Some(json!({ "colour": "red" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|d| d.contains("colour")));
    }

    #[tokio::test]
    async fn test_create_validates_body() {
        let (status, body) = send(Method::POST, "/companies", Some(json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "name: must not be empty");

        let (status, _) = send(
            Method::POST,
            "/designators",
            Some(json!({ "code": "ABCD", "name": "Too long" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stock_move_requires_positive_quantity() {
        let uri = format!("/inventory/stock/{}/move", uuid::Uuid::new_v4());
        let body = json!({ "storage_id": uuid::Uuid::new_v4(), "quantity": 0 });
        let (status, _) = send(Method::POST, &uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_availability_rejects_zero_builds() {
        let uri = format!("/projects/{}/availability?builds=0", uuid::Uuid::new_v4());
        let (status, _) = send(Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_runs_without_database() {
        let (status, body) = send(Method::GET, "/search/parts?q=resistor", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"], json!([]));

        let (status, body) = send(Method::GET, "/search/locations/suggestions?q=sm", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"], json!([]));

        let (status, _) = send(Method::GET, "/search/locations?limit=500", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
