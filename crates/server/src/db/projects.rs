//! Database operations for projects and BOM items.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use makerdb_core::stock::BomLine;
use makerdb_core::{BomItemId, PartId, ProjectId, ProjectStatus};

use super::stock::ON_HAND_SQL;
use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::project::{
    BomItem, CreateBomItemInput, CreateProjectInput, Project, ProjectFilter, UpdateBomItemInput,
    UpdateProjectInput,
};

const PROJECT_COLUMNS: &str = "id, name, description, notes, status, revision, tags, \
                               custom_fields, created_at, updated_at";

const BOM_ITEM_SELECT: &str = r"
    SELECT b.id, b.project_id, b.part_id, p.name AS part_name, b.quantity, b.designators,
           ARRAY(
               SELECT s.part_id FROM bom_item_substitutes s
               WHERE s.bom_item_id = b.id ORDER BY s.part_id
           ) AS substitute_ids,
           b.tags, b.custom_fields, b.created_at, b.updated_at
    FROM bom_items b
    JOIN parts p ON p.id = b.part_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: ProjectId,
    name: String,
    description: String,
    notes: String,
    status: ProjectStatus,
    revision: String,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            notes: row.notes,
            status: row.status,
            revision: row.revision,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BomItemRow {
    id: BomItemId,
    project_id: ProjectId,
    part_id: PartId,
    part_name: String,
    quantity: i32,
    designators: String,
    substitute_ids: Vec<PartId>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BomItemRow> for BomItem {
    fn from(row: BomItemRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            part_id: row.part_id,
            part_name: row.part_name,
            quantity: row.quantity,
            designators: row.designators,
            substitute_ids: row.substitute_ids,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BomLineRow {
    part_id: PartId,
    substitute_ids: Vec<PartId>,
    quantity: i32,
    attrition_percent: f64,
    attrition_quantity: i32,
}

impl From<BomLineRow> for BomLine {
    fn from(row: BomLineRow) -> Self {
        Self {
            part_id: row.part_id,
            substitute_ids: row.substitute_ids,
            per_build: row.quantity,
            attrition_percent: row.attrition_percent,
            attrition_quantity: row.attrition_quantity,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for project and BOM database operations.
pub struct ProjectRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectRepository<'a> {
    /// Create a new project repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// List projects, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProjectFilter,
        page: Page,
    ) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            r"
            SELECT {PROJECT_COLUMNS}
            FROM projects
            WHERE ($1::project_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(filter.status)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a project by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a project.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &CreateProjectInput) -> Result<Project, RepositoryError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r"
            INSERT INTO projects (name, description, notes, status, revision, tags, custom_fields)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PROJECT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.notes)
        .bind(input.status)
        .bind(&input.revision)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "project"))?;

        Ok(row.into())
    }

    /// Update the supplied fields of a project.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the project does not exist.
    pub async fn update(
        &self,
        id: ProjectId,
        input: &UpdateProjectInput,
    ) -> Result<Project, RepositoryError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r"
            UPDATE projects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                notes = COALESCE($4, notes),
                status = COALESCE($5, status),
                revision = COALESCE($6, revision),
                tags = COALESCE($7, tags),
                custom_fields = COALESCE($8, custom_fields)
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.description.as_deref())
        .bind(input.notes.as_deref())
        .bind(input.status)
        .bind(input.revision.as_deref())
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a project and its BOM.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the project does not exist.
    pub async fn delete(&self, id: ProjectId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_constraint(e, "project"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // BOM items
    // =========================================================================

    /// BOM lines of a project, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn bom(&self, project_id: ProjectId) -> Result<Vec<BomItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, BomItemRow>(&format!(
            "{BOM_ITEM_SELECT} WHERE b.project_id = $1 ORDER BY b.created_at, b.id"
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a line to a project's BOM.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the project does not exist.
    /// Returns `RepositoryError::Conflict` if a part does not exist.
    pub async fn create_item(
        &self,
        project_id: ProjectId,
        input: &CreateBomItemInput,
    ) -> Result<BomItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (BomItemId,) = sqlx::query_as(
            r"
            INSERT INTO bom_items (project_id, part_id, quantity, designators, tags, custom_fields)
            SELECT id, $2, $3, $4, $5, $6 FROM projects WHERE id = $1
            RETURNING id
            ",
        )
        .bind(project_id)
        .bind(input.part_id)
        .bind(input.quantity)
        .bind(&input.designators)
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "BOM item"))?
        .ok_or(RepositoryError::NotFound)?;

        set_substitutes(&mut tx, id, &input.substitute_ids).await?;
        let item = fetch_item(&mut tx, project_id, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(item)
    }

    /// Update the supplied fields of a BOM line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the project.
    /// Returns `RepositoryError::Invalid` if the line would list its own part as a substitute.
    pub async fn update_item(
        &self,
        project_id: ProjectId,
        id: BomItemId,
        input: &UpdateBomItemInput,
    ) -> Result<BomItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<(PartId,)> = sqlx::query_as(
            r"
            UPDATE bom_items SET
                part_id = COALESCE($3, part_id),
                quantity = COALESCE($4, quantity),
                designators = COALESCE($5, designators),
                tags = COALESCE($6, tags),
                custom_fields = COALESCE($7, custom_fields)
            WHERE id = $1 AND project_id = $2
            RETURNING part_id
            ",
        )
        .bind(id)
        .bind(project_id)
        .bind(input.part_id)
        .bind(input.quantity)
        .bind(input.designators.as_deref())
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "BOM item"))?;

        let (part_id,) = updated.ok_or(RepositoryError::NotFound)?;

        if let Some(substitute_ids) = &input.substitute_ids {
            if substitute_ids.contains(&part_id) {
                return Err(RepositoryError::Invalid(
                    "a line cannot list its own part as a substitute".to_owned(),
                ));
            }
            sqlx::query("DELETE FROM bom_item_substitutes WHERE bom_item_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            set_substitutes(&mut tx, id, substitute_ids).await?;
        } else {
            // A new part may not stay listed as its own substitute.
            sqlx::query("DELETE FROM bom_item_substitutes WHERE bom_item_id = $1 AND part_id = $2")
                .bind(id)
                .bind(part_id)
                .execute(&mut *tx)
                .await?;
        }

        let item = fetch_item(&mut tx, project_id, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(item)
    }

    /// Remove a line from a project's BOM.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not belong to the project.
    pub async fn delete_item(
        &self,
        project_id: ProjectId,
        id: BomItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM bom_items WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// BOM lines in creation order, with their substitutes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn bom_lines(&self, project_id: ProjectId) -> Result<Vec<BomLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, BomLineRow>(
            r"
            SELECT b.part_id,
                   ARRAY(
                       SELECT s.part_id FROM bom_item_substitutes s
                       WHERE s.bom_item_id = b.id ORDER BY s.part_id
                   ) AS substitute_ids,
                   b.quantity, p.attrition_percent, p.attrition_quantity
            FROM bom_items b
            JOIN parts p ON p.id = b.part_id
            WHERE b.project_id = $1
            ORDER BY b.created_at, b.id
            ",
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// On-hand totals for every part a project's BOM can draw on.
    ///
    /// Covers line parts and substitutes, each part once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn bom_stock(
        &self,
        project_id: ProjectId,
    ) -> Result<BTreeMap<PartId, i64>, RepositoryError> {
        let rows: Vec<(PartId, i64)> = sqlx::query_as(&format!(
            r"
            WITH used AS (
                SELECT b.part_id FROM bom_items b WHERE b.project_id = $1
                UNION
                SELECT s.part_id FROM bom_item_substitutes s
                JOIN bom_items b ON b.id = s.bom_item_id
                WHERE b.project_id = $1
            )
            SELECT u.part_id,
                   COALESCE(SUM(st.quantity) FILTER (WHERE {ON_HAND_SQL}), 0)::bigint AS on_hand
            FROM used u
            LEFT JOIN stock st ON st.part_id = u.part_id
            GROUP BY u.part_id
            "
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

async fn fetch_item(
    conn: &mut PgConnection,
    project_id: ProjectId,
    id: BomItemId,
) -> Result<Option<BomItem>, RepositoryError> {
    let row = sqlx::query_as::<_, BomItemRow>(&format!(
        "{BOM_ITEM_SELECT} WHERE b.id = $1 AND b.project_id = $2"
    ))
    .bind(id)
    .bind(project_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

async fn set_substitutes(
    conn: &mut PgConnection,
    id: BomItemId,
    substitute_ids: &[PartId],
) -> Result<(), RepositoryError> {
    if substitute_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r"
        INSERT INTO bom_item_substitutes (bom_item_id, part_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(id)
    .bind(substitute_ids)
    .execute(conn)
    .await
    .map_err(|e| map_constraint(e, "BOM substitute"))?;
    Ok(())
}
