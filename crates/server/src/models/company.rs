//! Companies: manufacturers and vendors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use makerdb_core::CompanyId;

use super::{CustomFields, MAX_NAME_LEN, ValidationError, limit_text, require_text};

/// A manufacturer and/or vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub website: String,
    pub is_manufacturer: bool,
    pub is_vendor: bool,
    /// Free-form contact records.
    pub contacts: Vec<Value>,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal company reference embedded in parts, orders and offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub id: CompanyId,
    pub name: String,
}

/// Filter for listing companies.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CompanyFilter {
    pub is_manufacturer: Option<bool>,
    pub is_vendor: Option<bool>,
}

/// Input for creating a company.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompanyInput {
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub is_manufacturer: bool,
    #[serde(default)]
    pub is_vendor: bool,
    #[serde(default)]
    pub contacts: Vec<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateCompanyInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        validate_website(&self.website)
    }
}

/// Input for updating a company.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCompanyInput {
    pub name: Option<String>,
    pub website: Option<String>,
    pub is_manufacturer: Option<bool>,
    pub is_vendor: Option<bool>,
    pub contacts: Option<Vec<Value>>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateCompanyInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        if let Some(website) = &self.website {
            validate_website(website)?;
        }
        Ok(())
    }
}

fn validate_website(website: &str) -> Result<(), ValidationError> {
    if website.is_empty() {
        return Ok(());
    }
    limit_text("website", website, 2000)?;
    match url::Url::parse(website) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(_) => Err(ValidationError::new("website", "must be an http(s) URL")),
        Err(e) => Err(ValidationError::new("website", e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults() {
        let input: CreateCompanyInput =
            serde_json::from_str(r#"{"name": "Yageo"}"#).expect("parse");
        assert!(!input.is_manufacturer);
        assert!(!input.is_vendor);
        assert!(input.website.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_website_must_be_http() {
        let input: CreateCompanyInput =
            serde_json::from_str(r#"{"name": "Mouser", "website": "ftp://mouser.com"}"#)
                .expect("parse");
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let result = serde_json::from_str::<UpdateCompanyInput>(r#"{"nmae": "typo"}"#);
        assert!(result.is_err());
    }
}
