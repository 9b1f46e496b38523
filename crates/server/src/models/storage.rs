//! Storage locations, optionally nested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use makerdb_core::StorageId;
use makerdb_core::stock::Occupancy;

use super::{CustomFields, MAX_NAME_LEN, ValidationError, require_text};

/// A physical storage location (shelf, bin, drawer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub id: StorageId,
    pub name: String,
    pub description: String,
    pub parent_id: Option<StorageId>,
    pub children_count: i64,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing locations.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StorageFilter {
    pub parent_id: Option<StorageId>,
}

/// What a location currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct StorageOccupancy {
    pub storage_id: StorageId,
    pub name: String,
    /// Distinct parts with on-hand stock.
    pub part_count: i64,
    /// Sum of on-hand quantities.
    pub total_quantity: i64,
    pub occupancy: Occupancy,
}

/// Input for creating a location.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStorageInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent_id: Option<StorageId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateStorageInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)
    }
}

/// Input for updating a location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStorageInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<StorageId>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateStorageInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}
