//! Procurement: vendor orders and price offers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use makerdb_core::{
    CompanyId, InStockStatus, OfferId, OfferType, OrderId, OrderStatus, PartId, PriceStructure,
    Quote, StorageId, validate_currency,
};

use super::company::CompanySummary;
use super::lot::Lot;
use super::stock::Stock;
use super::{CustomFields, MAX_NAME_LEN, ValidationError, limit_text, require_text};

const MAX_URL_LEN: usize = 2000;

// =============================================================================
// Orders
// =============================================================================

/// A purchase order placed with a vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub vendor: CompanySummary,
    /// Vendor order number.
    pub number: String,
    pub invoice_number: String,
    /// Internal PO number.
    pub po_number: String,
    pub comments: String,
    pub notes: String,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing orders.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub vendor_id: Option<CompanyId>,
}

/// Input for creating an order.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub vendor_id: CompanyId,
    pub number: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub po_number: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub notes: String,
    pub expected_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl CreateOrderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("number", &self.number, MAX_NAME_LEN)?;
        limit_text("invoice_number", &self.invoice_number, MAX_NAME_LEN)?;
        limit_text("po_number", &self.po_number, MAX_NAME_LEN)
    }
}

/// Input for updating an order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderInput {
    pub vendor_id: Option<CompanyId>,
    pub number: Option<String>,
    pub invoice_number: Option<String>,
    pub po_number: Option<String>,
    pub comments: Option<String>,
    pub notes: Option<String>,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateOrderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(number) = &self.number {
            require_text("number", number, MAX_NAME_LEN)?;
        }
        if let Some(invoice) = &self.invoice_number {
            limit_text("invoice_number", invoice, MAX_NAME_LEN)?;
        }
        if let Some(po) = &self.po_number {
            limit_text("po_number", po, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}

/// One received line of an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveLine {
    pub part_id: PartId,
    pub quantity: i32,
    pub price_unit: Option<Decimal>,
    #[serde(default)]
    pub currency: String,
}

/// Input for receiving an order into stock.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveOrderInput {
    /// Where the goods are put away.
    pub storage_id: StorageId,
    /// Name of the lot created for the delivery; defaults to the order number.
    pub lot_name: Option<String>,
    pub lines: Vec<ReceiveLine>,
}

impl ReceiveOrderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lines.is_empty() {
            return Err(ValidationError::new("lines", "must not be empty"));
        }
        if let Some(name) = &self.lot_name {
            require_text("lot_name", name, MAX_NAME_LEN)?;
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(ValidationError::new("lines.quantity", "must be positive"));
            }
            if line.price_unit.is_some_and(|p| p.is_sign_negative()) {
                return Err(ValidationError::new("lines.price_unit", "must not be negative"));
            }
            validate_currency(&line.currency)
                .map_err(|e| ValidationError::new("lines.currency", e.to_string()))?;
        }
        Ok(())
    }
}

/// Everything created by receiving an order.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedOrder {
    pub order: Order,
    pub lot: Lot,
    pub stock: Vec<Stock>,
}

// =============================================================================
// Offers
// =============================================================================

/// A vendor's price offer for a part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub offer_type: OfferType,
    pub vendor: Option<CompanySummary>,
    /// Vendor SKU.
    pub sku: String,
    /// Minimum order quantity.
    pub moq: i32,
    pub order_multiple: i32,
    pub prices: Vec<PriceStructure>,
    pub in_stock_status: Option<InStockStatus>,
    pub reference: String,
    pub comments: String,
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub part_id: Option<PartId>,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing offers.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OfferFilter {
    pub part_id: Option<PartId>,
    pub vendor_id: Option<CompanyId>,
}

/// Input for creating an offer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOfferInput {
    #[serde(default)]
    pub offer_type: OfferType,
    pub vendor_id: Option<CompanyId>,
    #[serde(default)]
    pub sku: String,
    #[serde(default = "one")]
    pub moq: i32,
    #[serde(default = "one")]
    pub order_multiple: i32,
    #[serde(default)]
    pub prices: Vec<PriceStructure>,
    pub in_stock_status: Option<InStockStatus>,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub part_id: Option<PartId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

const fn one() -> i32 {
    1
}

impl CreateOfferInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        limit_text("sku", &self.sku, MAX_NAME_LEN)?;
        limit_text("reference", &self.reference, MAX_NAME_LEN)?;
        limit_text("url", &self.url, MAX_URL_LEN)?;
        validate_quantities(Some(self.moq), Some(self.order_multiple))?;
        validate_prices(&self.prices)
    }
}

/// Input for updating an offer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOfferInput {
    pub offer_type: Option<OfferType>,
    pub vendor_id: Option<CompanyId>,
    pub sku: Option<String>,
    pub moq: Option<i32>,
    pub order_multiple: Option<i32>,
    pub prices: Option<Vec<PriceStructure>>,
    pub in_stock_status: Option<InStockStatus>,
    pub reference: Option<String>,
    pub comments: Option<String>,
    pub url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub part_id: Option<PartId>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateOfferInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(sku) = &self.sku {
            limit_text("sku", sku, MAX_NAME_LEN)?;
        }
        if let Some(reference) = &self.reference {
            limit_text("reference", reference, MAX_NAME_LEN)?;
        }
        if let Some(url) = &self.url {
            limit_text("url", url, MAX_URL_LEN)?;
        }
        validate_quantities(self.moq, self.order_multiple)?;
        if let Some(prices) = &self.prices {
            validate_prices(prices)?;
        }
        Ok(())
    }
}

fn validate_quantities(moq: Option<i32>, multiple: Option<i32>) -> Result<(), ValidationError> {
    if moq.is_some_and(|m| m < 1) {
        return Err(ValidationError::new("moq", "must be at least 1"));
    }
    if multiple.is_some_and(|m| m < 1) {
        return Err(ValidationError::new("order_multiple", "must be at least 1"));
    }
    Ok(())
}

fn validate_prices(prices: &[PriceStructure]) -> Result<(), ValidationError> {
    for structure in prices {
        if structure.currency.is_empty() {
            return Err(ValidationError::new("prices.currency", "must not be empty"));
        }
        validate_currency(&structure.currency)
            .map_err(|e| ValidationError::new("prices.currency", e.to_string()))?;
        for price_break in &structure.discounts {
            if price_break.quantity < 1 {
                return Err(ValidationError::new("prices.discounts.qty", "must be at least 1"));
            }
            if price_break.amount.is_sign_negative() {
                return Err(ValidationError::new(
                    "prices.discounts.amount",
                    "must not be negative",
                ));
            }
        }
    }
    Ok(())
}

/// Query for quoting an offer.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteQuery {
    pub quantity: i32,
    /// Required when the offer is priced in more than one currency.
    pub currency: Option<String>,
}

/// Quote for buying a quantity from an offer.
#[derive(Debug, Clone, Serialize)]
pub struct OfferQuote {
    pub offer_id: OfferId,
    /// `None` when no price break applies.
    pub quote: Option<Quote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_defaults() {
        let input: CreateOfferInput = serde_json::from_str(r#"{"sku": "311-10.0KHRCT-ND"}"#)
            .expect("parse");
        assert_eq!(input.moq, 1);
        assert_eq!(input.order_multiple, 1);
        assert_eq!(input.offer_type, OfferType::Local);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_offer_prices_validation() {
        let input: CreateOfferInput = serde_json::from_str(
            r#"{"prices": [{"currency": "USD", "discounts": [{"qty": 0, "amount": 0.1}]}]}"#,
        )
        .expect("parse");
        assert!(input.validate().is_err());

        let input: CreateOfferInput = serde_json::from_str(
            r#"{"prices": [{"currency": "", "discounts": [{"qty": 1, "amount": 0.1}]}]}"#,
        )
        .expect("parse");
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_moq() {
        let update = UpdateOfferInput {
            moq: Some(0),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_receive_requires_lines() {
        let input: ReceiveOrderInput = serde_json::from_str(
            r#"{"storage_id": "00000000-0000-0000-0000-000000000001", "lines": []}"#,
        )
        .expect("parse");
        assert!(input.validate().is_err());
    }
}
