//! Reference designator prefixes (R, C, U, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use makerdb_core::DesignatorId;

use super::{CustomFields, ValidationError, require_text};

/// Maximum designator code length.
pub const MAX_CODE_LEN: usize = 3;
const MAX_DESIGNATOR_NAME_LEN: usize = 128;

/// An electrical component designator prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Designator {
    pub id: DesignatorId,
    pub code: String,
    pub name: String,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a designator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDesignatorInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateDesignatorInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("code", &self.code, MAX_CODE_LEN)?;
        require_text("name", &self.name, MAX_DESIGNATOR_NAME_LEN)
    }
}

/// Input for updating a designator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDesignatorInput {
    pub code: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateDesignatorInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(code) = &self.code {
            require_text("code", code, MAX_CODE_LEN)?;
        }
        if let Some(name) = &self.name {
            require_text("name", name, MAX_DESIGNATOR_NAME_LEN)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_length() {
        let ok = CreateDesignatorInput {
            code: "LED".to_string(),
            name: "Light emitting diode".to_string(),
            tags: Vec::new(),
            custom_fields: CustomFields::new(),
        };
        assert!(ok.validate().is_ok());

        let too_long = CreateDesignatorInput {
            code: "DIODE".to_string(),
            ..ok
        };
        assert!(too_long.validate().is_err());
    }
}
