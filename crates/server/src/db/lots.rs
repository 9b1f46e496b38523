//! Database operations for lots.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use makerdb_core::{LotId, OrderId};

use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::lot::{CreateLotInput, Lot, LotFilter, UpdateLotInput};

const LOT_COLUMNS: &str = "id, name, description, comments, expiration_date, order_id, tags, \
                           custom_fields, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct LotRow {
    id: LotId,
    name: String,
    description: String,
    comments: String,
    expiration_date: Option<DateTime<Utc>>,
    order_id: Option<OrderId>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LotRow> for Lot {
    fn from(row: LotRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            comments: row.comments,
            expiration_date: row.expiration_date,
            order_id: row.order_id,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for lot database operations.
pub struct LotRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LotRepository<'a> {
    /// Create a new lot repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List lots, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &LotFilter, page: Page) -> Result<Vec<Lot>, RepositoryError> {
        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r"
            SELECT {LOT_COLUMNS}
            FROM lots
            WHERE ($1::uuid IS NULL OR order_id = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(filter.order_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a lot by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LotId) -> Result<Option<Lot>, RepositoryError> {
        let row = sqlx::query_as::<_, LotRow>(&format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Create a lot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order does not exist.
    pub async fn create(&self, input: &CreateLotInput) -> Result<Lot, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, input).await
    }

    /// Update the supplied fields of a lot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lot does not exist.
    pub async fn update(&self, id: LotId, input: &UpdateLotInput) -> Result<Lot, RepositoryError> {
        let row = sqlx::query_as::<_, LotRow>(&format!(
            r"
            UPDATE lots SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                comments = COALESCE($4, comments),
                expiration_date = COALESCE($5, expiration_date),
                order_id = COALESCE($6, order_id),
                tags = COALESCE($7, tags),
                custom_fields = COALESCE($8, custom_fields)
            WHERE id = $1
            RETURNING {LOT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.description.as_deref())
        .bind(input.comments.as_deref())
        .bind(input.expiration_date)
        .bind(input.order_id)
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "lot"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a lot. Stock entries in it keep no lot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the lot does not exist.
    pub async fn delete(&self, id: LotId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM lots WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Insert a lot on an existing connection (used when receiving orders).
pub(crate) async fn insert(
    conn: &mut PgConnection,
    input: &CreateLotInput,
) -> Result<Lot, RepositoryError> {
    let row = sqlx::query_as::<_, LotRow>(&format!(
        r"
        INSERT INTO lots (name, description, comments, expiration_date, order_id, tags, custom_fields)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {LOT_COLUMNS}
        "
    ))
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.comments)
    .bind(input.expiration_date)
    .bind(input.order_id)
    .bind(Json(&input.tags))
    .bind(Json(&input.custom_fields))
    .fetch_one(conn)
    .await
    .map_err(|e| map_constraint(e, "lot"))?;

    Ok(row.into())
}
