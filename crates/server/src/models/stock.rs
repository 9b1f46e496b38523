//! Stock entries: a quantity of a part at a location, optionally from a lot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use makerdb_core::{LotId, PartId, StockId, StockStatus, StorageId, validate_currency};

use super::{CustomFields, ValidationError, non_negative};

/// A stock entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub part_id: PartId,
    pub storage_id: StorageId,
    pub storage_name: String,
    pub lot_id: Option<LotId>,
    pub quantity: i32,
    /// `None` means on hand, same as `available`.
    pub status: Option<StockStatus>,
    pub price_unit: Option<Decimal>,
    /// ISO 4217 code, empty when not recorded.
    pub currency: String,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing stock entries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StockFilter {
    pub part_id: Option<PartId>,
    pub storage_id: Option<StorageId>,
    pub lot_id: Option<LotId>,
    pub status: Option<StockStatus>,
    /// Only entries that count as on hand (or only those that don't).
    pub on_hand: Option<bool>,
}

/// Input for creating a stock entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStockInput {
    pub part_id: PartId,
    pub storage_id: StorageId,
    pub lot_id: Option<LotId>,
    #[serde(default)]
    pub quantity: i32,
    pub status: Option<StockStatus>,
    pub price_unit: Option<Decimal>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateStockInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("quantity", self.quantity)?;
        validate_price(self.price_unit)?;
        validate_currency(&self.currency)
            .map_err(|e| ValidationError::new("currency", e.to_string()))
    }
}

/// Input for updating a stock entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStockInput {
    pub storage_id: Option<StorageId>,
    pub lot_id: Option<LotId>,
    pub quantity: Option<i32>,
    pub status: Option<StockStatus>,
    pub price_unit: Option<Decimal>,
    pub currency: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateStockInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(q) = self.quantity {
            non_negative("quantity", q)?;
        }
        validate_price(self.price_unit)?;
        if let Some(currency) = &self.currency {
            validate_currency(currency)
                .map_err(|e| ValidationError::new("currency", e.to_string()))?;
        }
        Ok(())
    }
}

/// Signed quantity change.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustStockInput {
    pub delta: i32,
}

/// Move some or all of an entry to another location.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveStockInput {
    pub storage_id: StorageId,
    /// Defaults to the whole entry.
    pub quantity: Option<i32>,
}

/// Result of a move.
#[derive(Debug, Clone, Serialize)]
pub struct MoveStockResult {
    /// What is left at the source, `None` when the whole entry moved.
    pub source: Option<Stock>,
    pub destination: Stock,
}

fn validate_price(price: Option<Decimal>) -> Result<(), ValidationError> {
    match price {
        Some(p) if p.is_sign_negative() => {
            Err(ValidationError::new("price_unit", "must not be negative"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateStockInput {
        CreateStockInput {
            part_id: PartId::new_v4(),
            storage_id: StorageId::new_v4(),
            lot_id: None,
            quantity: 10,
            status: None,
            price_unit: Some(Decimal::new(125, 3)),
            currency: "USD".to_string(),
            tags: Vec::new(),
            custom_fields: CustomFields::new(),
        }
    }

    #[test]
    fn test_valid_entry() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_quantity_and_price() {
        let mut i = input();
        i.quantity = -1;
        assert!(i.validate().is_err());

        let mut i = input();
        i.price_unit = Some(Decimal::new(-1, 0));
        assert!(i.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_currency() {
        let mut i = input();
        i.currency = "usd".to_string();
        let err = i.validate().unwrap_err();
        assert_eq!(err.field, "currency");
    }

    #[test]
    fn test_status_wire_value() {
        let json = r#"{"part_id":"00000000-0000-0000-0000-000000000001","storage_id":"00000000-0000-0000-0000-000000000002","status":"in-transit"}"#;
        let parsed: CreateStockInput = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.status, Some(StockStatus::InTransit));
        assert_eq!(parsed.quantity, 0);
    }
}
