//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::search::{SearchIndex, SearchSync};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and the search index.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    search: SearchIndex,
    search_sync: SearchSync,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Must be called inside a Tokio runtime; `search_sync` owns a worker task.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        pool: PgPool,
        search: SearchIndex,
        search_sync: SearchSync,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                search,
                search_sync,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    /// Get a handle for queueing search index updates.
    #[must_use]
    pub fn search_sync(&self) -> &SearchSync {
        &self.inner.search_sync
    }
}
