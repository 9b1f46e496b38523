//! Lots: batches of parts, optionally traced to a procurement order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use makerdb_core::{LotId, OrderId};

use super::{CustomFields, MAX_NAME_LEN, ValidationError, require_text};

/// A batch of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    pub description: String,
    pub comments: String,
    pub expiration_date: Option<DateTime<Utc>>,
    pub order_id: Option<OrderId>,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing lots.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LotFilter {
    pub order_id: Option<OrderId>,
}

/// Input for creating a lot.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLotInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: String,
    pub expiration_date: Option<DateTime<Utc>>,
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateLotInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)
    }
}

/// Input for updating a lot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLotInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub order_id: Option<OrderId>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateLotInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}
