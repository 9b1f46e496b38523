//! Database operations for stock entries.
//!
//! Quantity changes to an existing entry (`adjust`, `move_entry`) lock the
//! row with `SELECT ... FOR UPDATE` inside a transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use makerdb_core::stock::{MovePlan, ValuedStock, apply_adjustment, plan_move};
use makerdb_core::{LotId, PartId, StockId, StockStatus, StorageId};

use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::stock::{
    CreateStockInput, MoveStockInput, MoveStockResult, Stock, StockFilter, UpdateStockInput,
};

const STOCK_COLUMNS: &str = r"
    st.id, st.part_id, st.storage_id, s.name AS storage_name, st.lot_id, st.quantity, st.status,
    st.price_unit, st.currency, st.tags, st.custom_fields, st.created_at, st.updated_at
";

/// On-hand condition for the `stock` table aliased as `st`.
pub(crate) const ON_HAND_SQL: &str = "(st.status IS NULL OR st.status = 'available')";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: StockId,
    part_id: PartId,
    storage_id: StorageId,
    storage_name: String,
    lot_id: Option<LotId>,
    quantity: i32,
    status: Option<StockStatus>,
    price_unit: Option<Decimal>,
    currency: String,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Self {
            id: row.id,
            part_id: row.part_id,
            storage_id: row.storage_id,
            storage_name: row.storage_name,
            lot_id: row.lot_id,
            quantity: row.quantity,
            status: row.status,
            price_unit: row.price_unit,
            currency: row.currency,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The fields that decide whether two entries can be merged.
#[derive(Debug, sqlx::FromRow)]
struct LockedEntry {
    part_id: PartId,
    storage_id: StorageId,
    lot_id: Option<LotId>,
    quantity: i32,
    status: Option<StockStatus>,
    price_unit: Option<Decimal>,
    currency: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ValuationRow {
    quantity: i32,
    status: Option<StockStatus>,
    price_unit: Option<Decimal>,
    currency: String,
}

impl From<ValuationRow> for ValuedStock {
    fn from(row: ValuationRow) -> Self {
        Self {
            quantity: row.quantity,
            status: row.status,
            price_unit: row.price_unit,
            currency: row.currency,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for stock entry database operations.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List stock entries, newest first.
    ///
    /// `on_hand = Some(true)` keeps only entries with no status or `available`;
    /// `Some(false)` keeps only the others.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &StockFilter,
        page: Page,
    ) -> Result<Vec<Stock>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            r"
            SELECT {STOCK_COLUMNS}
            FROM stock st
            JOIN storage s ON s.id = st.storage_id
            WHERE ($1::uuid IS NULL OR st.part_id = $1)
              AND ($2::uuid IS NULL OR st.storage_id = $2)
              AND ($3::uuid IS NULL OR st.lot_id = $3)
              AND ($4::stock_status IS NULL OR st.status = $4)
              AND ($5::bool IS NULL OR {ON_HAND_SQL} = $5)
            ORDER BY st.created_at DESC, st.id
            LIMIT $6 OFFSET $7
            "
        ))
        .bind(filter.part_id)
        .bind(filter.storage_id)
        .bind(filter.lot_id)
        .bind(filter.status)
        .bind(filter.on_hand)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every entry of one part, ordered by location name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_part(&self, part_id: PartId) -> Result<Vec<Stock>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            r"
            SELECT {STOCK_COLUMNS}
            FROM stock st
            JOIN storage s ON s.id = st.storage_id
            WHERE st.part_id = $1
            ORDER BY s.name, st.created_at
            "
        ))
        .bind(part_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a stock entry by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StockId) -> Result<Option<Stock>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Create a stock entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the part must live in its default
    /// location and `storage_id` is elsewhere.
    /// Returns `RepositoryError::Conflict` if a referenced record does not exist.
    pub async fn create(&self, input: &CreateStockInput) -> Result<Stock, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        check_default_storage(&mut tx, input.part_id, input.storage_id).await?;
        let stock = insert(&mut tx, input).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Update the supplied fields of a stock entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn update(
        &self,
        id: StockId,
        input: &UpdateStockInput,
    ) -> Result<Stock, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(storage_id) = input.storage_id {
            let (part_id,): (PartId,) = sqlx::query_as("SELECT part_id FROM stock WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            check_default_storage(&mut tx, part_id, storage_id).await?;
        }

        let result = sqlx::query(
            r"
            UPDATE stock SET
                storage_id = COALESCE($2, storage_id),
                lot_id = COALESCE($3, lot_id),
                quantity = COALESCE($4, quantity),
                status = COALESCE($5, status),
                price_unit = COALESCE($6, price_unit),
                currency = COALESCE($7, currency),
                tags = COALESCE($8, tags),
                custom_fields = COALESCE($9, custom_fields)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.storage_id)
        .bind(input.lot_id)
        .bind(input.quantity)
        .bind(input.status)
        .bind(input.price_unit)
        .bind(input.currency.as_deref())
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "stock entry"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        let stock = fetch(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Delete a stock entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn delete(&self, id: StockId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stock WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` (possibly negative) to an entry's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    /// Returns `RepositoryError::Stock` if the result would be negative.
    #[instrument(skip(self))]
    pub async fn adjust(&self, id: StockId, delta: i32) -> Result<Stock, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let entry = lock(&mut tx, id).await?;
        let quantity = apply_adjustment(entry.quantity, delta)?;

        sqlx::query("UPDATE stock SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        let stock = fetch(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(stock_id = %id, delta, quantity, "Adjusted stock");
        Ok(stock)
    }

    /// Move all or part of an entry to another location.
    ///
    /// The moved quantity merges into an entry at the destination with the
    /// same part, lot, status and price, or becomes a new entry. Moving the
    /// whole entry re-points it (or merges and deletes it), so `source` is
    /// `None` when nothing remains behind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    /// Returns `RepositoryError::Invalid` if the destination is the current location.
    /// Returns `RepositoryError::Stock` if more than the entry holds is requested.
    #[instrument(skip(self, input), fields(destination = %input.storage_id))]
    pub async fn move_entry(
        &self,
        id: StockId,
        input: &MoveStockInput,
    ) -> Result<MoveStockResult, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Find the merge target before locking anything, then lock the
        // source and target together so opposite moves take the same order.
        let snapshot = read_entry(&mut tx, id).await?;
        let candidate =
            find_merge_target(&mut tx, &snapshot, input.storage_id, id, None).await?;
        lock_in_order(&mut tx, &lock_ids(id, candidate)).await?;

        let entry = lock(&mut tx, id).await?;
        if entry.storage_id == input.storage_id {
            return Err(RepositoryError::Invalid(
                "stock is already in that location".to_owned(),
            ));
        }
        check_default_storage(&mut tx, entry.part_id, input.storage_id).await?;

        let requested = input.quantity.unwrap_or(entry.quantity);
        let plan = plan_move(entry.quantity, requested)?;
        let target = match candidate {
            Some(target_id) => {
                find_merge_target(&mut tx, &entry, input.storage_id, id, Some(target_id)).await?
            }
            None => None,
        };

        let (source, destination_id) = match (plan, target) {
            (MovePlan::Whole, Some(target_id)) => {
                add_quantity(&mut tx, target_id, entry.quantity).await?;
                sqlx::query("DELETE FROM stock WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                (None, target_id)
            }
            (MovePlan::Whole, None) => {
                sqlx::query("UPDATE stock SET storage_id = $2 WHERE id = $1")
                    .bind(id)
                    .bind(input.storage_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_constraint(e, "storage location"))?;
                (None, id)
            }
            (MovePlan::Split { remaining }, target) => {
                sqlx::query("UPDATE stock SET quantity = $2 WHERE id = $1")
                    .bind(id)
                    .bind(remaining)
                    .execute(&mut *tx)
                    .await?;
                let destination_id = if let Some(target_id) = target {
                    add_quantity(&mut tx, target_id, requested).await?;
                    target_id
                } else {
                    split_off(&mut tx, id, input.storage_id, requested).await?
                };
                (Some(id), destination_id)
            }
        };

        let source = match source {
            Some(source_id) => fetch(&mut tx, source_id).await?,
            None => None,
        };
        let destination = fetch(&mut tx, destination_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(
            stock_id = %id,
            destination_id = %destination.id,
            quantity = requested,
            "Moved stock"
        );
        Ok(MoveStockResult {
            source,
            destination,
        })
    }

    /// Quantity, status and price of every entry, for inventory valuation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn valuation_entries(&self) -> Result<Vec<ValuedStock>, RepositoryError> {
        let rows = sqlx::query_as::<_, ValuationRow>(
            "SELECT quantity, status, price_unit, currency FROM stock st WHERE price_unit IS NOT NULL",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn fetch(conn: &mut PgConnection, id: StockId) -> Result<Option<Stock>, RepositoryError> {
    let row = sqlx::query_as::<_, StockRow>(&format!(
        r"
        SELECT {STOCK_COLUMNS}
        FROM stock st
        JOIN storage s ON s.id = st.storage_id
        WHERE st.id = $1
        "
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

const ENTRY_SELECT: &str = r"
    SELECT part_id, storage_id, lot_id, quantity, status, price_unit, currency
    FROM stock
    WHERE id = $1
";

async fn read_entry(conn: &mut PgConnection, id: StockId) -> Result<LockedEntry, RepositoryError> {
    sqlx::query_as::<_, LockedEntry>(ENTRY_SELECT)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}

async fn lock(conn: &mut PgConnection, id: StockId) -> Result<LockedEntry, RepositoryError> {
    sqlx::query_as::<_, LockedEntry>(&format!("{ENTRY_SELECT} FOR UPDATE"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// IDs to lock for a move, sorted and without duplicates.
fn lock_ids(source: StockId, target: Option<StockId>) -> Vec<StockId> {
    let mut ids: Vec<StockId> = std::iter::once(source).chain(target).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Lock several entries, always in ID order.
async fn lock_in_order(conn: &mut PgConnection, ids: &[StockId]) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM stock WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids)
        .execute(conn)
        .await?;
    Ok(())
}

/// An entry at `storage_id` that `entry` can merge into.
///
/// With `only`, checks whether that specific entry still qualifies.
async fn find_merge_target(
    conn: &mut PgConnection,
    entry: &LockedEntry,
    storage_id: StorageId,
    exclude: StockId,
    only: Option<StockId>,
) -> Result<Option<StockId>, RepositoryError> {
    let row: Option<(StockId,)> = sqlx::query_as(
        r"
        SELECT id FROM stock
        WHERE part_id = $1
          AND storage_id = $2
          AND lot_id IS NOT DISTINCT FROM $3
          AND status IS NOT DISTINCT FROM $4
          AND price_unit IS NOT DISTINCT FROM $5
          AND currency = $6
          AND id <> $7
          AND ($8::uuid IS NULL OR id = $8)
        ORDER BY created_at
        LIMIT 1
        ",
    )
    .bind(entry.part_id)
    .bind(storage_id)
    .bind(entry.lot_id)
    .bind(entry.status)
    .bind(entry.price_unit)
    .bind(&entry.currency)
    .bind(exclude)
    .bind(only)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(id,)| id))
}

async fn add_quantity(
    conn: &mut PgConnection,
    id: StockId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE stock SET quantity = quantity + $2 WHERE id = $1")
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await
        .map_err(|e| map_constraint(e, "stock entry"))?;
    Ok(())
}

/// Copy an entry to `storage_id` with `quantity`, returning the new ID.
async fn split_off(
    conn: &mut PgConnection,
    from: StockId,
    storage_id: StorageId,
    quantity: i32,
) -> Result<StockId, RepositoryError> {
    let (id,): (StockId,) = sqlx::query_as(
        r"
        INSERT INTO stock (part_id, storage_id, lot_id, quantity, status, price_unit, currency, tags, custom_fields)
        SELECT part_id, $2, lot_id, $3, status, price_unit, currency, tags, custom_fields
        FROM stock WHERE id = $1
        RETURNING id
        ",
    )
    .bind(from)
    .bind(storage_id)
    .bind(quantity)
    .fetch_one(conn)
    .await
    .map_err(|e| map_constraint(e, "storage location"))?;

    Ok(id)
}

/// Reject locations other than the part's default when the default is mandatory.
pub(crate) async fn check_default_storage(
    conn: &mut PgConnection,
    part_id: PartId,
    storage_id: StorageId,
) -> Result<(), RepositoryError> {
    let part: Option<(Option<StorageId>, bool)> = sqlx::query_as(
        "SELECT default_storage_id, is_default_storage_mandatory FROM parts WHERE id = $1",
    )
    .bind(part_id)
    .fetch_optional(conn)
    .await?;

    default_storage_rule(part_id, part, storage_id)
}

/// Apply a part's `(default_storage_id, is_default_storage_mandatory)` to a location.
fn default_storage_rule(
    part_id: PartId,
    part: Option<(Option<StorageId>, bool)>,
    storage_id: StorageId,
) -> Result<(), RepositoryError> {
    match part {
        None => Err(RepositoryError::Invalid(format!("part {part_id} does not exist"))),
        Some((Some(default_id), true)) if default_id != storage_id => {
            Err(RepositoryError::Invalid(format!(
                "part {part_id} must be stored in its default location {default_id}"
            )))
        }
        Some(_) => Ok(()),
    }
}

/// Insert a stock entry on an existing connection.
pub(crate) async fn insert(
    conn: &mut PgConnection,
    input: &CreateStockInput,
) -> Result<Stock, RepositoryError> {
    let (id,): (StockId,) = sqlx::query_as(
        r"
        INSERT INTO stock (part_id, storage_id, lot_id, quantity, status, price_unit, currency, tags, custom_fields)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        ",
    )
    .bind(input.part_id)
    .bind(input.storage_id)
    .bind(input.lot_id)
    .bind(input.quantity)
    .bind(input.status)
    .bind(input.price_unit)
    .bind(&input.currency)
    .bind(Json(&input.tags))
    .bind(Json(&input.custom_fields))
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, "stock entry"))?;

    fetch(conn, id).await?.ok_or(RepositoryError::NotFound)
}

/// Set the status-less quantity of a part at a location, creating the entry
/// if needed (used by seeding).
pub async fn upsert_for_part_at(
    conn: &mut PgConnection,
    part_id: PartId,
    storage_id: StorageId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let existing: Option<(StockId,)> = sqlx::query_as(
        r"
        SELECT id FROM stock
        WHERE part_id = $1 AND storage_id = $2 AND status IS NULL
        ORDER BY created_at
        LIMIT 1
        ",
    )
    .bind(part_id)
    .bind(storage_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id,)) = existing {
        sqlx::query("UPDATE stock SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO stock (part_id, storage_id, quantity) VALUES ($1, $2, $3)")
        .bind(part_id)
        .bind(storage_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}
