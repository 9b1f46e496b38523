//! Database operations for procurement orders and vendor offers.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use makerdb_core::{
    CompanyId, InStockStatus, OfferId, OfferType, OrderId, OrderStatus, PartId, PriceStructure,
    StockStatus,
};

use super::companies::{CompanyRole, require_role};
use super::{Page, RepositoryError, lots, map_constraint, stock};
use crate::models::CustomFields;
use crate::models::company::CompanySummary;
use crate::models::lot::CreateLotInput;
use crate::models::procurement::{
    CreateOfferInput, CreateOrderInput, Offer, OfferFilter, Order, OrderFilter, ReceiveOrderInput,
    ReceivedOrder, UpdateOfferInput, UpdateOrderInput,
};
use crate::models::stock::CreateStockInput;

const ORDER_SELECT: &str = r"
    SELECT o.id, o.vendor_id, v.name AS vendor_name, o.number, o.invoice_number, o.po_number,
           o.comments, o.notes, o.expected_arrival, o.status, o.tags, o.custom_fields,
           o.created_at, o.updated_at
    FROM orders o
    JOIN companies v ON v.id = o.vendor_id
";

const OFFER_SELECT: &str = r"
    SELECT f.id, f.offer_type, f.vendor_id, v.name AS vendor_name, f.sku, f.moq,
           f.order_multiple, f.prices, f.in_stock_status, f.reference, f.comments, f.url,
           f.expires_at, f.part_id, f.tags, f.custom_fields, f.created_at, f.updated_at
    FROM offers f
    LEFT JOIN companies v ON v.id = f.vendor_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    vendor_id: CompanyId,
    vendor_name: String,
    number: String,
    invoice_number: String,
    po_number: String,
    comments: String,
    notes: String,
    expected_arrival: Option<DateTime<Utc>>,
    status: OrderStatus,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            vendor: CompanySummary {
                id: row.vendor_id,
                name: row.vendor_name,
            },
            number: row.number,
            invoice_number: row.invoice_number,
            po_number: row.po_number,
            comments: row.comments,
            notes: row.notes,
            expected_arrival: row.expected_arrival,
            status: row.status,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: OfferId,
    offer_type: OfferType,
    vendor_id: Option<CompanyId>,
    vendor_name: Option<String>,
    sku: String,
    moq: i32,
    order_multiple: i32,
    prices: Json<Vec<PriceStructure>>,
    in_stock_status: Option<InStockStatus>,
    reference: String,
    comments: String,
    url: String,
    expires_at: Option<DateTime<Utc>>,
    part_id: Option<PartId>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OfferRow> for Offer {
    fn from(row: OfferRow) -> Self {
        let vendor = row
            .vendor_id
            .zip(row.vendor_name)
            .map(|(id, name)| CompanySummary { id, name });
        Self {
            id: row.id,
            offer_type: row.offer_type,
            vendor,
            sku: row.sku,
            moq: row.moq,
            order_multiple: row.order_multiple,
            prices: row.prices.0,
            in_stock_status: row.in_stock_status,
            reference: row.reference,
            comments: row.comments,
            url: row.url,
            expires_at: row.expires_at,
            part_id: row.part_id,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Repository for procurement order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter, page: Page) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            {ORDER_SELECT}
            WHERE ($1::order_status IS NULL OR o.status = $1)
              AND ($2::uuid IS NULL OR o.vendor_id = $2)
            ORDER BY o.created_at DESC, o.id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.status)
        .bind(filter.vendor_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the vendor is not a vendor.
    pub async fn create(&self, input: &CreateOrderInput) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        require_role(&mut *tx, input.vendor_id, CompanyRole::Vendor).await?;

        let (id,): (OrderId,) = sqlx::query_as(
            r"
            INSERT INTO orders (
                vendor_id, number, invoice_number, po_number, comments, notes,
                expected_arrival, status, tags, custom_fields
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(input.vendor_id)
        .bind(&input.number)
        .bind(&input.invoice_number)
        .bind(&input.po_number)
        .bind(&input.comments)
        .bind(&input.notes)
        .bind(input.expected_arrival)
        .bind(input.status)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "order"))?;

        let order = fetch_order(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(order)
    }

    /// Update the supplied fields of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Invalid` if the new vendor is not a vendor.
    pub async fn update(&self, id: OrderId, input: &UpdateOrderInput) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(vendor_id) = input.vendor_id {
            require_role(&mut *tx, vendor_id, CompanyRole::Vendor).await?;
        }

        let result = sqlx::query(
            r"
            UPDATE orders SET
                vendor_id = COALESCE($2, vendor_id),
                number = COALESCE($3, number),
                invoice_number = COALESCE($4, invoice_number),
                po_number = COALESCE($5, po_number),
                comments = COALESCE($6, comments),
                notes = COALESCE($7, notes),
                expected_arrival = COALESCE($8, expected_arrival),
                status = COALESCE($9, status),
                tags = COALESCE($10, tags),
                custom_fields = COALESCE($11, custom_fields)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.vendor_id)
        .bind(input.number.as_deref())
        .bind(input.invoice_number.as_deref())
        .bind(input.po_number.as_deref())
        .bind(input.comments.as_deref())
        .bind(input.notes.as_deref())
        .bind(input.expected_arrival)
        .bind(input.status)
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "order"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        let order = fetch_order(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(order)
    }

    /// Delete an order. Lots from it keep no order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Receive an order into stock.
    ///
    /// Creates a lot traced to the order, one available stock entry per line
    /// at `storage_id`, and marks the order received.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if it was already received.
    /// Returns `RepositoryError::Invalid` if a line's part must be stored
    /// in a different default location.
    #[instrument(skip(self, input), fields(lines = input.lines.len()))]
    pub async fn receive(
        &self,
        id: OrderId,
        input: &ReceiveOrderInput,
    ) -> Result<ReceivedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (number, status): (String, OrderStatus) =
            sqlx::query_as("SELECT number, status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        ensure_receivable(status)?;

        let lot = lots::insert(
            &mut tx,
            &CreateLotInput {
                name: input.lot_name.clone().unwrap_or(number),
                description: String::new(),
                comments: String::new(),
                expiration_date: None,
                order_id: Some(id),
                tags: Vec::new(),
                custom_fields: CustomFields::new(),
            },
        )
        .await?;

        let mut entries = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            stock::check_default_storage(&mut tx, line.part_id, input.storage_id).await?;
            let entry = stock::insert(
                &mut tx,
                &CreateStockInput {
                    part_id: line.part_id,
                    storage_id: input.storage_id,
                    lot_id: Some(lot.id),
                    quantity: line.quantity,
                    status: Some(StockStatus::Available),
                    price_unit: line.price_unit,
                    currency: line.currency.clone(),
                    tags: Vec::new(),
                    custom_fields: CustomFields::new(),
                },
            )
            .await?;
            entries.push(entry);
        }

        sqlx::query("UPDATE orders SET status = 'received' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let order = fetch_order(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(order_id = %id, lot_id = %lot.id, entries = entries.len(), "Received order");
        Ok(ReceivedOrder {
            order,
            lot,
            stock: entries,
        })
    }
}

/// An order can be received once.
fn ensure_receivable(status: OrderStatus) -> Result<(), RepositoryError> {
    if status == OrderStatus::Received {
        return Err(RepositoryError::Conflict(
            "order has already been received".to_owned(),
        ));
    }
    Ok(())
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

// =============================================================================
// Offers
// =============================================================================

/// Repository for vendor offer database operations.
pub struct OfferRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OfferRepository<'a> {
    /// Create a new offer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List offers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OfferFilter, page: Page) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            r"
            {OFFER_SELECT}
            WHERE ($1::uuid IS NULL OR f.part_id = $1)
              AND ($2::uuid IS NULL OR f.vendor_id = $2)
            ORDER BY f.created_at DESC, f.id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.part_id)
        .bind(filter.vendor_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an offer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_offer(&mut conn, id).await
    }

    /// Create an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the vendor is not a vendor.
    /// Returns `RepositoryError::Conflict` if the part does not exist.
    pub async fn create(&self, input: &CreateOfferInput) -> Result<Offer, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(vendor_id) = input.vendor_id {
            require_role(&mut *tx, vendor_id, CompanyRole::Vendor).await?;
        }

        let (id,): (OfferId,) = sqlx::query_as(
            r"
            INSERT INTO offers (
                offer_type, vendor_id, sku, moq, order_multiple, prices, in_stock_status,
                reference, comments, url, expires_at, part_id, tags, custom_fields
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            ",
        )
        .bind(input.offer_type)
        .bind(input.vendor_id)
        .bind(&input.sku)
        .bind(input.moq)
        .bind(input.order_multiple)
        .bind(Json(&input.prices))
        .bind(input.in_stock_status)
        .bind(&input.reference)
        .bind(&input.comments)
        .bind(&input.url)
        .bind(input.expires_at)
        .bind(input.part_id)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "offer"))?;

        let offer = fetch_offer(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(offer)
    }

    /// Update the supplied fields of an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    /// Returns `RepositoryError::Invalid` if the new vendor is not a vendor.
    pub async fn update(&self, id: OfferId, input: &UpdateOfferInput) -> Result<Offer, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(vendor_id) = input.vendor_id {
            require_role(&mut *tx, vendor_id, CompanyRole::Vendor).await?;
        }

        let result = sqlx::query(
            r"
            UPDATE offers SET
                offer_type = COALESCE($2, offer_type),
                vendor_id = COALESCE($3, vendor_id),
                sku = COALESCE($4, sku),
                moq = COALESCE($5, moq),
                order_multiple = COALESCE($6, order_multiple),
                prices = COALESCE($7, prices),
                in_stock_status = COALESCE($8, in_stock_status),
                reference = COALESCE($9, reference),
                comments = COALESCE($10, comments),
                url = COALESCE($11, url),
                expires_at = COALESCE($12, expires_at),
                part_id = COALESCE($13, part_id),
                tags = COALESCE($14, tags),
                custom_fields = COALESCE($15, custom_fields)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.offer_type)
        .bind(input.vendor_id)
        .bind(input.sku.as_deref())
        .bind(input.moq)
        .bind(input.order_multiple)
        .bind(input.prices.as_ref().map(Json))
        .bind(input.in_stock_status)
        .bind(input.reference.as_deref())
        .bind(input.comments.as_deref())
        .bind(input.url.as_deref())
        .bind(input.expires_at)
        .bind(input.part_id)
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "offer"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        let offer = fetch_offer(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(offer)
    }

    /// Delete an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    pub async fn delete(&self, id: OfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn fetch_offer(conn: &mut PgConnection, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
    let row = sqlx::query_as::<_, OfferRow>(&format!("{OFFER_SELECT} WHERE f.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_received_once() {
        assert!(ensure_receivable(OrderStatus::Open).is_ok());
        assert!(ensure_receivable(OrderStatus::Ordered).is_ok());
        assert!(matches!(
            ensure_receivable(OrderStatus::Received),
            Err(RepositoryError::Conflict(_))
        ));
    }
}
