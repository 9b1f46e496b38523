//! Database operations for parts, substitutes and meta-part membership.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use makerdb_core::stock::stock_level;
use makerdb_core::{CompanyId, DesignatorId, PartId, PartType, ProjectId, StorageId};

use super::companies::{CompanyRole, require_role};
use super::stock::ON_HAND_SQL;
use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::company::CompanySummary;
use crate::models::part::{CreatePartInput, Part, PartFilter, UpdatePartInput};

// =============================================================================
// Internal Row Types
// =============================================================================

fn part_select() -> String {
    format!(
        r"
        SELECT p.id, p.part_type, p.designator_id, p.name, p.description, p.notes, p.footprint,
               p.manufacturer_id, m.name AS manufacturer_name, p.mpn, p.cad_keys,
               p.low_stock_threshold, p.attrition_percent, p.attrition_quantity,
               p.default_storage_id, p.is_default_storage_mandatory, p.project_id,
               p.tags, p.custom_fields, p.created_at, p.updated_at,
               COALESCE((
                   SELECT SUM(st.quantity) FROM stock st
                   WHERE st.part_id = p.id AND {ON_HAND_SQL}
               ), 0)::bigint AS total_stock
        FROM parts p
        LEFT JOIN companies m ON m.id = p.manufacturer_id
        "
    )
}

/// Filter on the `part_select()` columns; binds `$1..$4`.
const PART_FILTER_SQL: &str = r"
    ($1::part_type IS NULL OR p.part_type = $1)
    AND ($2::uuid IS NULL OR p.manufacturer_id = $2)
    AND ($3::uuid IS NULL OR p.designator_id = $3)
    AND ($4::text IS NULL OR strpos(lower(p.name), lower($4)) > 0 OR strpos(lower(p.mpn), lower($4)) > 0)
";

#[derive(Debug, sqlx::FromRow)]
struct PartRow {
    id: PartId,
    part_type: PartType,
    designator_id: Option<DesignatorId>,
    name: String,
    description: String,
    notes: String,
    footprint: String,
    manufacturer_id: Option<CompanyId>,
    manufacturer_name: Option<String>,
    mpn: String,
    cad_keys: Json<Vec<String>>,
    low_stock_threshold: Option<i32>,
    attrition_percent: f64,
    attrition_quantity: i32,
    default_storage_id: Option<StorageId>,
    is_default_storage_mandatory: bool,
    project_id: Option<ProjectId>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    total_stock: i64,
}

impl From<PartRow> for Part {
    fn from(row: PartRow) -> Self {
        let manufacturer = row
            .manufacturer_id
            .zip(row.manufacturer_name)
            .map(|(id, name)| CompanySummary { id, name });
        Self {
            id: row.id,
            part_type: row.part_type,
            designator_id: row.designator_id,
            name: row.name,
            description: row.description,
            notes: row.notes,
            footprint: row.footprint,
            manufacturer,
            mpn: row.mpn,
            cad_keys: row.cad_keys.0,
            low_stock_threshold: row.low_stock_threshold,
            attrition_percent: row.attrition_percent,
            attrition_quantity: row.attrition_quantity,
            default_storage_id: row.default_storage_id,
            is_default_storage_mandatory: row.is_default_storage_mandatory,
            project_id: row.project_id,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            total_stock: row.total_stock,
            stock_level: stock_level(row.total_stock, row.low_stock_threshold),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for part database operations.
pub struct PartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PartRepository<'a> {
    /// Create a new part repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List parts, newest first.
    ///
    /// `q` matches a case-insensitive substring of the name or MPN.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &PartFilter, page: Page) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartRow>(&format!(
            "{} WHERE {PART_FILTER_SQL} ORDER BY p.created_at DESC, p.id LIMIT $5 OFFSET $6",
            part_select()
        ))
        .bind(filter.part_type)
        .bind(filter.manufacturer_id)
        .bind(filter.designator_id)
        .bind(filter.q.as_deref())
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count parts matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, filter: &PartFilter) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM parts p WHERE {PART_FILTER_SQL}"
        ))
        .bind(filter.part_type)
        .bind(filter.manufacturer_id)
        .bind(filter.designator_id)
        .bind(filter.q.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Every part, for rebuilding the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartRow>(&format!("{} ORDER BY p.created_at", part_select()))
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Parts with a threshold whose on-hand stock is at or below it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, page: Page) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartRow>(&format!(
            r"
            SELECT * FROM ({}) p
            WHERE p.low_stock_threshold IS NOT NULL AND p.total_stock <= p.low_stock_threshold
            ORDER BY p.total_stock, p.name
            LIMIT $1 OFFSET $2
            ",
            part_select()
        ))
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a part by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PartId) -> Result<Option<Part>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Create a part.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the manufacturer is not a manufacturer.
    /// Returns `RepositoryError::Conflict` if a referenced record does not exist.
    pub async fn create(&self, input: &CreatePartInput) -> Result<Part, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(manufacturer_id) = input.manufacturer_id {
            require_role(&mut *tx, manufacturer_id, CompanyRole::Manufacturer).await?;
        }

        let (id,): (PartId,) = sqlx::query_as(
            r"
            INSERT INTO parts (
                part_type, designator_id, name, description, notes, footprint,
                manufacturer_id, mpn, cad_keys, low_stock_threshold, attrition_percent,
                attrition_quantity, default_storage_id, is_default_storage_mandatory,
                project_id, tags, custom_fields
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id
            ",
        )
        .bind(input.part_type)
        .bind(input.designator_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(&input.footprint)
        .bind(input.manufacturer_id)
        .bind(&input.mpn)
        .bind(Json(&input.cad_keys))
        .bind(input.low_stock_threshold)
        .bind(input.attrition_percent)
        .bind(input.attrition_quantity)
        .bind(input.default_storage_id)
        .bind(input.is_default_storage_mandatory)
        .bind(input.project_id)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "part"))?;

        let part = fetch(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(part)
    }

    /// Update the supplied fields of a part.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the part does not exist.
    /// Returns `RepositoryError::Invalid` if the manufacturer is not a manufacturer,
    /// or a mandatory default location would be left unset.
    pub async fn update(&self, id: PartId, input: &UpdatePartInput) -> Result<Part, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(manufacturer_id) = input.manufacturer_id {
            require_role(&mut *tx, manufacturer_id, CompanyRole::Manufacturer).await?;
        }

        let updated: Option<(Option<StorageId>, bool)> = sqlx::query_as(
            r"
            UPDATE parts SET
                part_type = COALESCE($2, part_type),
                designator_id = COALESCE($3, designator_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                notes = COALESCE($6, notes),
                footprint = COALESCE($7, footprint),
                manufacturer_id = COALESCE($8, manufacturer_id),
                mpn = COALESCE($9, mpn),
                cad_keys = COALESCE($10, cad_keys),
                low_stock_threshold = COALESCE($11, low_stock_threshold),
                attrition_percent = COALESCE($12, attrition_percent),
                attrition_quantity = COALESCE($13, attrition_quantity),
                default_storage_id = COALESCE($14, default_storage_id),
                is_default_storage_mandatory = COALESCE($15, is_default_storage_mandatory),
                project_id = COALESCE($16, project_id),
                tags = COALESCE($17, tags),
                custom_fields = COALESCE($18, custom_fields)
            WHERE id = $1
            RETURNING default_storage_id, is_default_storage_mandatory
            ",
        )
        .bind(id)
        .bind(input.part_type)
        .bind(input.designator_id)
        .bind(input.name.as_deref())
        .bind(input.description.as_deref())
        .bind(input.notes.as_deref())
        .bind(input.footprint.as_deref())
        .bind(input.manufacturer_id)
        .bind(input.mpn.as_deref())
        .bind(input.cad_keys.as_ref().map(Json))
        .bind(input.low_stock_threshold)
        .bind(input.attrition_percent)
        .bind(input.attrition_quantity)
        .bind(input.default_storage_id)
        .bind(input.is_default_storage_mandatory)
        .bind(input.project_id)
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "part"))?;

        match updated {
            None => return Err(RepositoryError::NotFound),
            Some((None, true)) => {
                return Err(RepositoryError::Invalid(
                    "default_storage_id is required when is_default_storage_mandatory is set"
                        .to_owned(),
                ));
            }
            Some(_) => {}
        }

        let part = fetch(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(part)
    }

    /// Delete a part together with its stock and offers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the part does not exist.
    /// Returns `RepositoryError::Conflict` if a BOM still uses it.
    pub async fn delete(&self, id: PartId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM parts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| match map_constraint(e, "part") {
                RepositoryError::Conflict(_) => {
                    RepositoryError::Conflict("part is used in a project BOM".to_owned())
                }
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Substitutes
    // =========================================================================

    /// Parts that can stand in for `id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn substitutes(&self, id: PartId) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartRow>(&format!(
            r"
            {}
            WHERE p.id IN (SELECT substitute_id FROM part_substitutes WHERE part_id = $1)
            ORDER BY p.name
            ",
            part_select()
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark two parts as interchangeable (in both directions).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` when both IDs are the same part.
    /// Returns `RepositoryError::NotFound` if either part does not exist.
    pub async fn add_substitute(&self, id: PartId, other: PartId) -> Result<(), RepositoryError> {
        if id == other {
            return Err(RepositoryError::Invalid(
                "a part cannot substitute itself".to_owned(),
            ));
        }
        sqlx::query(
            r"
            INSERT INTO part_substitutes (part_id, substitute_id)
            VALUES ($1, $2), ($2, $1)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(other)
        .execute(self.pool)
        .await
        .map_err(|e| match map_constraint(e, "substitute") {
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })?;
        Ok(())
    }

    /// Remove a substitute pairing (in both directions).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the parts were not paired.
    pub async fn remove_substitute(&self, id: PartId, other: PartId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM part_substitutes
            WHERE (part_id = $1 AND substitute_id = $2) OR (part_id = $2 AND substitute_id = $1)
            ",
        )
        .bind(id)
        .bind(other)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Meta-part membership
    // =========================================================================

    /// Member parts of a meta part.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn members(&self, meta_id: PartId) -> Result<Vec<Part>, RepositoryError> {
        let rows = sqlx::query_as::<_, PartRow>(&format!(
            r"
            {}
            WHERE p.id IN (SELECT member_id FROM part_meta_members WHERE meta_part_id = $1)
            ORDER BY p.name
            ",
            part_select()
        ))
        .bind(meta_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a member to a meta part.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if either part does not exist.
    /// Returns `RepositoryError::Invalid` if `meta_id` is not a meta part, or
    /// the member is itself a meta part.
    pub async fn add_member(&self, meta_id: PartId, member_id: PartId) -> Result<(), RepositoryError> {
        let types: Vec<(PartId, PartType)> =
            sqlx::query_as("SELECT id, part_type FROM parts WHERE id = ANY($1)")
                .bind(vec![meta_id, member_id])
                .fetch_all(self.pool)
                .await?;

        let type_of = |id: PartId| types.iter().find(|(p, _)| *p == id).map(|(_, t)| *t);
        match (type_of(meta_id), type_of(member_id)) {
            (None, _) | (_, None) => return Err(RepositoryError::NotFound),
            (Some(t), _) if t != PartType::Meta => {
                return Err(RepositoryError::Invalid(format!("part {meta_id} is not a meta part")));
            }
            (_, Some(PartType::Meta)) => {
                return Err(RepositoryError::Invalid(
                    "a meta part cannot be a member of another meta part".to_owned(),
                ));
            }
            _ => {}
        }

        sqlx::query(
            r"
            INSERT INTO part_meta_members (meta_part_id, member_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(meta_id)
        .bind(member_id)
        .execute(self.pool)
        .await
        .map_err(|e| map_constraint(e, "meta part member"))?;
        Ok(())
    }

    /// Remove a member from a meta part.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the part was not a member.
    pub async fn remove_member(
        &self,
        meta_id: PartId,
        member_id: PartId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM part_meta_members WHERE meta_part_id = $1 AND member_id = $2")
                .bind(meta_id)
                .bind(member_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn fetch(conn: &mut PgConnection, id: PartId) -> Result<Option<Part>, RepositoryError> {
    let row = sqlx::query_as::<_, PartRow>(&format!("{} WHERE p.id = $1", part_select()))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Into::into))
}

/// Fields written when seeding a part.
#[derive(Debug, Clone, Copy)]
pub struct SeedPart<'s> {
    pub name: &'s str,
    pub description: &'s str,
    pub designator_id: Option<DesignatorId>,
    pub manufacturer_id: Option<CompanyId>,
}

/// Insert or update a part matched by name.
///
/// Returns the part ID and whether it was created.
pub async fn upsert_by_name(
    conn: &mut PgConnection,
    part: SeedPart<'_>,
) -> Result<(PartId, bool), RepositoryError> {
    let existing: Option<(PartId,)> =
        sqlx::query_as("SELECT id FROM parts WHERE name = $1 ORDER BY created_at LIMIT 1")
            .bind(part.name)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some((id,)) = existing {
        sqlx::query(
            r"
            UPDATE parts SET description = $2, designator_id = $3, manufacturer_id = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(part.description)
        .bind(part.designator_id)
        .bind(part.manufacturer_id)
        .execute(&mut *conn)
        .await?;
        return Ok((id, false));
    }

    let (id,): (PartId,) = sqlx::query_as(
        r"
        INSERT INTO parts (name, description, designator_id, manufacturer_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(part.name)
    .bind(part.description)
    .bind(part.designator_id)
    .bind(part.manufacturer_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok((id, true))
}
