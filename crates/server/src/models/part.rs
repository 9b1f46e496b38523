//! Parts: the catalogue of components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use makerdb_core::stock::{MAX_ATTRITION_PERCENT, StockLevel};
use makerdb_core::{CompanyId, DesignatorId, PartId, PartType, ProjectId, StorageId};

use super::company::CompanySummary;
use super::stock::Stock;
use super::{CustomFields, MAX_NAME_LEN, ValidationError, limit_text, non_negative, require_text};

/// A part with its on-hand stock total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub part_type: PartType,
    pub designator_id: Option<DesignatorId>,
    pub name: String,
    pub description: String,
    /// Markdown.
    pub notes: String,
    pub footprint: String,
    pub manufacturer: Option<CompanySummary>,
    /// Manufacturer part number.
    pub mpn: String,
    pub cad_keys: Vec<String>,
    pub low_stock_threshold: Option<i32>,
    pub attrition_percent: f64,
    pub attrition_quantity: i32,
    pub default_storage_id: Option<StorageId>,
    pub is_default_storage_mandatory: bool,
    /// Project that builds this part, for sub-assemblies.
    pub project_id: Option<ProjectId>,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    /// Sum of on-hand stock entries.
    pub total_stock: i64,
    pub stock_level: StockLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing parts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartFilter {
    pub part_type: Option<PartType>,
    pub manufacturer_id: Option<CompanyId>,
    pub designator_id: Option<DesignatorId>,
    /// Case-insensitive substring of name or MPN.
    pub q: Option<String>,
}

/// Stock entries of a part with their aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct PartStock {
    pub part_id: PartId,
    pub total_on_hand: i64,
    pub low_stock_threshold: Option<i32>,
    pub level: StockLevel,
    pub entries: Vec<Stock>,
}

/// Input for creating a part.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePartInput {
    #[serde(default)]
    pub part_type: PartType,
    pub name: String,
    pub designator_id: Option<DesignatorId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub footprint: String,
    pub manufacturer_id: Option<CompanyId>,
    #[serde(default)]
    pub mpn: String,
    #[serde(default)]
    pub cad_keys: Vec<String>,
    pub low_stock_threshold: Option<i32>,
    #[serde(default)]
    pub attrition_percent: f64,
    #[serde(default)]
    pub attrition_quantity: i32,
    pub default_storage_id: Option<StorageId>,
    #[serde(default)]
    pub is_default_storage_mandatory: bool,
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreatePartInput {
    /// A local part with only a name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            part_type: PartType::default(),
            name: name.into(),
            designator_id: None,
            description: String::new(),
            notes: String::new(),
            footprint: String::new(),
            manufacturer_id: None,
            mpn: String::new(),
            cad_keys: Vec::new(),
            low_stock_threshold: None,
            attrition_percent: 0.0,
            attrition_quantity: 0,
            default_storage_id: None,
            is_default_storage_mandatory: false,
            project_id: None,
            tags: Vec::new(),
            custom_fields: CustomFields::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        limit_text("footprint", &self.footprint, MAX_NAME_LEN)?;
        limit_text("mpn", &self.mpn, MAX_NAME_LEN)?;
        validate_inventory_control(
            self.low_stock_threshold,
            Some(self.attrition_percent),
            Some(self.attrition_quantity),
        )?;
        if self.is_default_storage_mandatory && self.default_storage_id.is_none() {
            return Err(ValidationError::new(
                "default_storage_id",
                "required when is_default_storage_mandatory is set",
            ));
        }
        Ok(())
    }
}

/// Input for updating a part.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePartInput {
    pub part_type: Option<PartType>,
    pub name: Option<String>,
    pub designator_id: Option<DesignatorId>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub footprint: Option<String>,
    pub manufacturer_id: Option<CompanyId>,
    pub mpn: Option<String>,
    pub cad_keys: Option<Vec<String>>,
    pub low_stock_threshold: Option<i32>,
    pub attrition_percent: Option<f64>,
    pub attrition_quantity: Option<i32>,
    pub default_storage_id: Option<StorageId>,
    pub is_default_storage_mandatory: Option<bool>,
    pub project_id: Option<ProjectId>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdatePartInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        if let Some(footprint) = &self.footprint {
            limit_text("footprint", footprint, MAX_NAME_LEN)?;
        }
        if let Some(mpn) = &self.mpn {
            limit_text("mpn", mpn, MAX_NAME_LEN)?;
        }
        validate_inventory_control(
            self.low_stock_threshold,
            self.attrition_percent,
            self.attrition_quantity,
        )
    }
}

fn validate_inventory_control(
    threshold: Option<i32>,
    attrition_percent: Option<f64>,
    attrition_quantity: Option<i32>,
) -> Result<(), ValidationError> {
    if let Some(t) = threshold {
        non_negative("low_stock_threshold", t)?;
    }
    if let Some(p) = attrition_percent
        && !(0.0..=MAX_ATTRITION_PERCENT).contains(&p)
    {
        return Err(ValidationError::new(
            "attrition_percent",
            "must be between 0 and 1000",
        ));
    }
    if let Some(q) = attrition_quantity {
        non_negative("attrition_quantity", q)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_minimal_part() {
        let input: CreatePartInput =
            serde_json::from_str(r#"{"name": "10k 0603"}"#).expect("parse");
        assert_eq!(input.part_type, PartType::Local);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_part_type_wire_value() {
        let input: CreatePartInput =
            serde_json::from_str(r#"{"name": "Controller board", "part_type": "sub-assembly"}"#)
                .expect("parse");
        assert_eq!(input.part_type, PartType::SubAssembly);
    }

    #[test]
    fn test_rejects_negative_attrition() {
        let mut input = CreatePartInput::named("LED");
        input.attrition_percent = -1.0;
        assert!(input.validate().is_err());

        let mut input = CreatePartInput::named("LED");
        input.low_stock_threshold = Some(-5);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_attrition_percent_is_bounded() {
        let mut input = CreatePartInput::named("LED");
        input.attrition_percent = MAX_ATTRITION_PERCENT;
        assert!(input.validate().is_ok());

        input.attrition_percent = 1e30;
        assert!(input.validate().is_err());

        input.attrition_percent = f64::NAN;
        assert!(input.validate().is_err());

        let update = UpdatePartInput {
            attrition_percent: Some(f64::INFINITY),
            ..UpdatePartInput::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_mandatory_default_storage_needs_location() {
        let mut input = CreatePartInput::named("Fuse");
        input.is_default_storage_mandatory = true;
        assert!(input.validate().is_err());
        input.default_storage_id = Some(StorageId::new_v4());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        assert!(serde_json::from_str::<UpdatePartInput>(r#"{"total_stock": 5}"#).is_err());
    }
}
