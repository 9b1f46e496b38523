//! Domain models for the MakerDB API.
//!
//! Each entity has a read model (serialized in responses), a create input and
//! an update input. Update inputs reject unknown fields and only touch the
//! fields that are present.

pub mod attachment;
pub mod company;
pub mod dashboard;
pub mod designator;
pub mod lot;
pub mod part;
pub mod procurement;
pub mod project;
pub mod stock;
pub mod storage;

use serde_json::{Map, Value};
use thiserror::Error;

/// Free-form key/value metadata attached to most entities.
pub type CustomFields = Map<String, Value>;

/// Maximum length of `VARCHAR(255)` columns.
pub const MAX_NAME_LEN: usize = 255;

/// A request body failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a required, length-limited text field.
pub fn require_text(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    limit_text(field, value, max_len)
}

/// Check an optional text field against a maximum length.
pub fn limit_text(field: &'static str, value: &str, max_len: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_len} characters (got {len})"),
        ));
    }
    Ok(())
}

/// Check that a count is not negative.
pub fn non_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "R1", MAX_NAME_LEN).is_ok());
        assert!(require_text("name", "   ", MAX_NAME_LEN).is_err());
        let err = require_text("code", "ABCD", 3).unwrap_err();
        assert_eq!(err.to_string(), "code: must be at most 3 characters (got 4)");
    }

    #[test]
    fn test_non_negative() {
        assert!(non_negative("quantity", 0).is_ok());
        assert!(non_negative("quantity", -1).is_err());
    }
}
