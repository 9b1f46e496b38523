//! Request extractors that report rejections as `{"detail": ...}` JSON.
//!
//! Drop-in replacements for axum's `Json`, `Query` and `Path`.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::Page;
use crate::error::AppError;

/// JSON body extractor and response.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: serde::Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Path parameter extractor.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `skip` / `limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Validate into a [`Page`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when `skip` is negative or `limit` is
    /// outside `1..=1000`.
    pub fn page(self) -> Result<Page, AppError> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(Page::DEFAULT_LIMIT);

        if skip < 0 {
            return Err(AppError::BadRequest("skip must not be negative".to_string()));
        }
        if !(1..=Page::MAX_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                Page::MAX_LIMIT
            )));
        }
        Ok(Page { skip, limit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let page = Pagination::default().page().expect("valid");
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_pagination_bounds() {
        let page = |skip, limit| Pagination { skip, limit }.page();
        assert!(page(Some(0), Some(1)).is_ok());
        assert!(page(Some(10), Some(1000)).is_ok());
        assert!(page(Some(-1), None).is_err());
        assert!(page(None, Some(0)).is_err());
        assert!(page(None, Some(1001)).is_err());
    }
}
