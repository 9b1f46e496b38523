//! Integration tests for MakerDB.
//!
//! # Running Tests
//!
//! ```bash
//! # Library-level tests (no services needed)
//! cargo test -p makerdb-integration-tests
//!
//! # API tests against a running server backed by PostgreSQL
//! makerdb migrate
//! cargo run -p makerdb-server &
//! cargo test -p makerdb-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_*` - HTTP tests against a running server (ignored by default)
//! - `seed_data` - Seed file parsing
//! - `search_index` - In-memory search index behavior

use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Base URL of the API under test (`MAKERDB_API_URL`).
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("MAKERDB_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// A client bound to the API under test.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: api_base_url(),
        }
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// `GET` a path, returning status and JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");
        read(resp).await
    }

    /// `POST` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");
        read(resp).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn put(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");
        read(resp).await
    }

    /// `DELETE` a path, returning only the status.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn delete(&self, path: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request")
            .status()
    }

    /// Create a record and return its id.
    ///
    /// # Panics
    ///
    /// Panics unless the server answers `201 Created` with an `id`.
    pub async fn create(&self, path: &str, body: &Value) -> String {
        let (status, json) = self.post(path, body).await;
        assert_eq!(status, StatusCode::CREATED, "create {path} failed: {json}");
        json["id"]
            .as_str()
            .expect("created record has an id")
            .to_string()
    }
}

async fn read(resp: reqwest::Response) -> (StatusCode, Value) {
    let status = resp.status();
    let text = resp.text().await.expect("Failed to read response body");
    let json = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).expect("Response is not JSON")
    };
    (status, json)
}

impl TestContext {
    /// Page through a list endpoint until an item with `key == value` shows up.
    ///
    /// # Panics
    ///
    /// Panics if a page cannot be fetched.
    pub async fn find_listed(&self, path: &str, key: &str, value: &str) -> Option<Value> {
        const PAGE: usize = 1000;
        let sep = if path.contains('?') { '&' } else { '?' };
        for skip in (0..).step_by(PAGE) {
            let (status, body) = self
                .get(&format!("{path}{sep}skip={skip}&limit={PAGE}"))
                .await;
            assert_eq!(status, StatusCode::OK, "listing {path} failed: {body}");
            let items = body.as_array().cloned().unwrap_or_default();
            if let Some(found) = items.iter().find(|item| item[key] == value) {
                return Some(found.clone());
            }
            if items.len() < PAGE {
                return None;
            }
        }
        None
    }
}

/// A name unlikely to collide with existing data.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}
