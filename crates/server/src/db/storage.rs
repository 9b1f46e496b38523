//! Database operations for storage locations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use makerdb_core::StorageId;
use makerdb_core::stock::Occupancy;

use super::stock::ON_HAND_SQL;
use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::storage::{
    CreateStorageInput, Storage, StorageFilter, StorageOccupancy, UpdateStorageInput,
};

const STORAGE_COLUMNS: &str = r"
    s.id, s.name, s.description, s.parent_id, s.tags, s.custom_fields, s.created_at, s.updated_at,
    (SELECT COUNT(*) FROM storage c WHERE c.parent_id = s.id) AS children_count
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StorageRow {
    id: StorageId,
    name: String,
    description: String,
    parent_id: Option<StorageId>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    children_count: i64,
}

impl From<StorageRow> for Storage {
    fn from(row: StorageRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            parent_id: row.parent_id,
            children_count: row.children_count,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OccupancyRow {
    id: StorageId,
    name: String,
    part_count: i64,
    total_quantity: i64,
}

impl From<OccupancyRow> for StorageOccupancy {
    fn from(row: OccupancyRow) -> Self {
        Self {
            storage_id: row.id,
            name: row.name,
            part_count: row.part_count,
            total_quantity: row.total_quantity,
            occupancy: Occupancy::from_part_count(row.part_count),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for storage location database operations.
pub struct StorageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StorageRepository<'a> {
    /// Create a new storage repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List locations ordered by name, optionally only the children of `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &StorageFilter,
        page: Page,
    ) -> Result<Vec<Storage>, RepositoryError> {
        let rows = sqlx::query_as::<_, StorageRow>(&format!(
            r"
            SELECT {STORAGE_COLUMNS}
            FROM storage s
            WHERE ($1::uuid IS NULL OR s.parent_id = $1)
            ORDER BY s.name, s.id
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(filter.parent_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every location, for rebuilding the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Storage>, RepositoryError> {
        let rows = sqlx::query_as::<_, StorageRow>(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storage s ORDER BY s.created_at"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a location by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StorageId) -> Result<Option<Storage>, RepositoryError> {
        let row = sqlx::query_as::<_, StorageRow>(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storage s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the parent does not exist.
    pub async fn create(&self, input: &CreateStorageInput) -> Result<Storage, RepositoryError> {
        let row = sqlx::query_as::<_, StorageRow>(&format!(
            r"
            WITH s AS (
                INSERT INTO storage (name, description, parent_id, tags, custom_fields)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT s.id, s.name, s.description, s.parent_id, s.tags, s.custom_fields,
                   s.created_at, s.updated_at, 0::bigint AS children_count
            FROM s
            "
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "storage location"))?;

        Ok(row.into())
    }

    /// Update the supplied fields of a location.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the location does not exist.
    /// Returns `RepositoryError::Invalid` if the new parent would create a cycle.
    pub async fn update(
        &self,
        id: StorageId,
        input: &UpdateStorageInput,
    ) -> Result<Storage, RepositoryError> {
        if let Some(parent_id) = input.parent_id
            && self.is_descendant_or_self(parent_id, id).await?
        {
            return Err(RepositoryError::Invalid(
                "a location cannot be moved under itself or one of its children".to_owned(),
            ));
        }

        let updated: Option<(StorageId,)> = sqlx::query_as(
            r"
            UPDATE storage SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                parent_id = COALESCE($4, parent_id),
                tags = COALESCE($5, tags),
                custom_fields = COALESCE($6, custom_fields)
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.description.as_deref())
        .bind(input.parent_id)
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "storage location"))?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Whether `candidate` is `ancestor` or lies below it.
    async fn is_descendant_or_self(
        &self,
        candidate: StorageId,
        ancestor: StorageId,
    ) -> Result<bool, RepositoryError> {
        let (found,): (bool,) = sqlx::query_as(
            r"
            WITH RECURSIVE subtree AS (
                SELECT id FROM storage WHERE id = $2
                UNION
                SELECT s.id FROM storage s JOIN subtree t ON s.parent_id = t.id
            )
            SELECT EXISTS(SELECT 1 FROM subtree WHERE id = $1)
            ",
        )
        .bind(candidate)
        .bind(ancestor)
        .fetch_one(self.pool)
        .await?;

        Ok(found)
    }

    /// Delete a location. Children become top-level locations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the location does not exist.
    /// Returns `RepositoryError::Conflict` if it still holds stock.
    pub async fn delete(&self, id: StorageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storage WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| match map_constraint(e, "storage location") {
                RepositoryError::Conflict(_) => {
                    RepositoryError::Conflict("storage location still holds stock".to_owned())
                }
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// What each location holds: distinct parts and total quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn occupancy(&self, page: Page) -> Result<Vec<StorageOccupancy>, RepositoryError> {
        let rows = sqlx::query_as::<_, OccupancyRow>(&occupancy_query())
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Occupancy counts only stock that is on hand.
fn occupancy_query() -> String {
    format!(
        r"
        SELECT s.id, s.name,
               COUNT(DISTINCT st.part_id) FILTER (WHERE st.quantity > 0) AS part_count,
               COALESCE(SUM(st.quantity), 0)::bigint AS total_quantity
        FROM storage s
        LEFT JOIN stock st ON st.storage_id = s.id AND {ON_HAND_SQL}
        GROUP BY s.id, s.name
        ORDER BY s.name, s.id
        LIMIT $1 OFFSET $2
        "
    )
}

/// Find a location by name or create it with `description`.
///
/// Returns the location ID and whether it was created.
pub async fn get_or_create_by_name(
    conn: &mut PgConnection,
    name: &str,
    description: &str,
) -> Result<(StorageId, bool), RepositoryError> {
    let existing: Option<(StorageId,)> =
        sqlx::query_as("SELECT id FROM storage WHERE name = $1 ORDER BY created_at LIMIT 1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some((id,)) = existing {
        return Ok((id, false));
    }

    let (id,): (StorageId,) =
        sqlx::query_as("INSERT INTO storage (name, description) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(description)
            .fetch_one(&mut *conn)
            .await?;
    Ok((id, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_ignores_stock_not_on_hand() {
        let query = occupancy_query();
        assert!(query.contains(&format!("st.storage_id = s.id AND {ON_HAND_SQL}")));
        // The filter sits in the join so empty locations still appear.
        assert!(query.contains("LEFT JOIN stock st"));
        assert!(!query.contains("WHERE (st.status"));
    }
}
