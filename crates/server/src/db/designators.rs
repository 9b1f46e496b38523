//! Database operations for reference designators.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use makerdb_core::DesignatorId;

use super::{RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::designator::{CreateDesignatorInput, Designator, UpdateDesignatorInput};

const DESIGNATOR_COLUMNS: &str = "id, code, name, tags, custom_fields, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DesignatorRow {
    id: DesignatorId,
    code: String,
    name: String,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DesignatorRow> for Designator {
    fn from(row: DesignatorRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for designator database operations.
pub struct DesignatorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DesignatorRepository<'a> {
    /// Create a new designator repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all designators ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Designator>, RepositoryError> {
        let rows = sqlx::query_as::<_, DesignatorRow>(&format!(
            "SELECT {DESIGNATOR_COLUMNS} FROM designators ORDER BY code"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a designator by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DesignatorId) -> Result<Option<Designator>, RepositoryError> {
        let row = sqlx::query_as::<_, DesignatorRow>(&format!(
            "SELECT {DESIGNATOR_COLUMNS} FROM designators WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a designator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is already used.
    pub async fn create(
        &self,
        input: &CreateDesignatorInput,
    ) -> Result<Designator, RepositoryError> {
        let row = sqlx::query_as::<_, DesignatorRow>(&format!(
            r"
            INSERT INTO designators (code, name, tags, custom_fields)
            VALUES ($1, $2, $3, $4)
            RETURNING {DESIGNATOR_COLUMNS}
            "
        ))
        .bind(&input.code)
        .bind(&input.name)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "designator code"))?;

        Ok(row.into())
    }

    /// Update the supplied fields of a designator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the designator does not exist.
    /// Returns `RepositoryError::Conflict` if the new code is already used.
    pub async fn update(
        &self,
        id: DesignatorId,
        input: &UpdateDesignatorInput,
    ) -> Result<Designator, RepositoryError> {
        let row = sqlx::query_as::<_, DesignatorRow>(&format!(
            r"
            UPDATE designators SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                tags = COALESCE($4, tags),
                custom_fields = COALESCE($5, custom_fields)
            WHERE id = $1
            RETURNING {DESIGNATOR_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.code.as_deref())
        .bind(input.name.as_deref())
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "designator code"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a designator. Parts using it keep no designator.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the designator does not exist.
    pub async fn delete(&self, id: DesignatorId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM designators WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Insert or update a designator matched by code.
///
/// Returns the designator and whether it was created.
pub async fn upsert_by_code(
    conn: &mut PgConnection,
    code: &str,
    name: &str,
) -> Result<(Designator, bool), RepositoryError> {
    // xmax = 0 only for freshly inserted rows.
    let row: DesignatorRowWithInsert = sqlx::query_as(&format!(
        r"
        INSERT INTO designators (code, name)
        VALUES ($1, $2)
        ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
        RETURNING {DESIGNATOR_COLUMNS}, (xmax = 0) AS inserted
        "
    ))
    .bind(code)
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok((row.designator.into(), row.inserted))
}

#[derive(Debug, sqlx::FromRow)]
struct DesignatorRowWithInsert {
    #[sqlx(flatten)]
    designator: DesignatorRow,
    inserted: bool,
}

/// Look up a designator by code.
pub async fn find_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<DesignatorId>, RepositoryError> {
    let row: Option<(DesignatorId,)> = sqlx::query_as("SELECT id FROM designators WHERE code = $1")
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(id,)| id))
}
