//! Database operations for companies (manufacturers and vendors).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use sqlx::types::Json;

use makerdb_core::CompanyId;

use super::{Page, RepositoryError, map_constraint};
use crate::models::CustomFields;
use crate::models::company::{
    Company, CompanyFilter, CompanySummary, CreateCompanyInput, UpdateCompanyInput,
};

// =============================================================================
// Internal Row Types
// =============================================================================

const COMPANY_COLUMNS: &str = "id, name, website, is_manufacturer, is_vendor, contacts, tags, \
                               custom_fields, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: CompanyId,
    name: String,
    website: String,
    is_manufacturer: bool,
    is_vendor: bool,
    contacts: Json<Vec<Value>>,
    tags: Json<Vec<String>>,
    custom_fields: Json<CustomFields>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            website: row.website,
            is_manufacturer: row.is_manufacturer,
            is_vendor: row.is_vendor,
            contacts: row.contacts.0,
            tags: row.tags.0,
            custom_fields: row.custom_fields.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Which role a company must have to be referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyRole {
    Manufacturer,
    Vendor,
}

impl CompanyRole {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Manufacturer => "manufacturer",
            Self::Vendor => "vendor",
        }
    }
}

/// Check that `id` names a company with `role`.
///
/// Works on any executor so it can run inside a transaction.
pub(crate) async fn require_role<'e, E>(
    executor: E,
    id: CompanyId,
    role: CompanyRole,
) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let flags: Option<(bool, bool)> =
        sqlx::query_as("SELECT is_manufacturer, is_vendor FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;

    check_role(id, flags, role)
}

/// Decide a role check from the company's `(is_manufacturer, is_vendor)` flags.
fn check_role(
    id: CompanyId,
    flags: Option<(bool, bool)>,
    role: CompanyRole,
) -> Result<(), RepositoryError> {
    let has_role = match (flags, role) {
        (None, _) => {
            return Err(RepositoryError::Invalid(format!("company {id} does not exist")));
        }
        (Some((is_manufacturer, _)), CompanyRole::Manufacturer) => is_manufacturer,
        (Some((_, is_vendor)), CompanyRole::Vendor) => is_vendor,
    };

    if has_role {
        Ok(())
    } else {
        Err(RepositoryError::Invalid(format!(
            "company {id} is not a {}",
            role.as_str()
        )))
    }
}

/// Load the `{id, name}` summary of a company.
pub(crate) async fn summary<'e, E>(
    executor: E,
    id: CompanyId,
) -> Result<Option<CompanySummary>, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: Option<(CompanyId, String)> =
        sqlx::query_as("SELECT id, name FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
    Ok(row.map(|(id, name)| CompanySummary { id, name }))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for company database operations.
pub struct CompanyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CompanyRepository<'a> {
    /// Create a new company repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List companies, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CompanyFilter,
        page: Page,
    ) -> Result<Vec<Company>, RepositoryError> {
        let rows = sqlx::query_as::<_, CompanyRow>(&format!(
            r"
            SELECT {COMPANY_COLUMNS}
            FROM companies
            WHERE ($1::bool IS NULL OR is_manufacturer = $1)
              AND ($2::bool IS NULL OR is_vendor = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(filter.is_manufacturer)
        .bind(filter.is_vendor)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count companies matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, filter: &CompanyFilter) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM companies
            WHERE ($1::bool IS NULL OR is_manufacturer = $1)
              AND ($2::bool IS NULL OR is_vendor = $2)
            ",
        )
        .bind(filter.is_manufacturer)
        .bind(filter.is_vendor)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Get a company by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CompanyId) -> Result<Option<Company>, RepositoryError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &CreateCompanyInput) -> Result<Company, RepositoryError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            r"
            INSERT INTO companies (name, website, is_manufacturer, is_vendor, contacts, tags, custom_fields)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COMPANY_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(&input.website)
        .bind(input.is_manufacturer)
        .bind(input.is_vendor)
        .bind(Json(&input.contacts))
        .bind(Json(&input.tags))
        .bind(Json(&input.custom_fields))
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "company"))?;

        Ok(row.into())
    }

    /// Update the supplied fields of a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the company does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(
        &self,
        id: CompanyId,
        input: &UpdateCompanyInput,
    ) -> Result<Company, RepositoryError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            r"
            UPDATE companies SET
                name = COALESCE($2, name),
                website = COALESCE($3, website),
                is_manufacturer = COALESCE($4, is_manufacturer),
                is_vendor = COALESCE($5, is_vendor),
                contacts = COALESCE($6, contacts),
                tags = COALESCE($7, tags),
                custom_fields = COALESCE($8, custom_fields)
            WHERE id = $1
            RETURNING {COMPANY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.website.as_deref())
        .bind(input.is_manufacturer)
        .bind(input.is_vendor)
        .bind(input.contacts.as_ref().map(Json))
        .bind(input.tags.as_ref().map(Json))
        .bind(input.custom_fields.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint(e, "company"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a company.
    ///
    /// Parts lose their manufacturer and offers from the company are removed.
    /// Companies with orders cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the company does not exist.
    /// Returns `RepositoryError::Conflict` if orders still reference it.
    pub async fn delete(&self, id: CompanyId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_constraint(e, "company"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Look up a manufacturer by exact name.
pub async fn find_manufacturer(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<CompanyId>, RepositoryError> {
    let row: Option<(CompanyId,)> = sqlx::query_as(
        "SELECT id FROM companies WHERE name = $1 AND is_manufacturer ORDER BY created_at LIMIT 1",
    )
    .bind(name)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Insert or update a company matched by name.
///
/// Returns the company and whether it was created. Used by seeding inside
/// its transaction.
pub async fn upsert_by_name(
    conn: &mut PgConnection,
    name: &str,
    website: &str,
    is_manufacturer: bool,
    is_vendor: bool,
) -> Result<(Company, bool), RepositoryError> {
    let existing: Option<(CompanyId,)> =
        sqlx::query_as("SELECT id FROM companies WHERE name = $1 ORDER BY created_at LIMIT 1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some((id,)) = existing {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            r"
            UPDATE companies SET website = $2, is_manufacturer = $3, is_vendor = $4
            WHERE id = $1
            RETURNING {COMPANY_COLUMNS}
            "
        ))
        .bind(id)
        .bind(website)
        .bind(is_manufacturer)
        .bind(is_vendor)
        .fetch_one(&mut *conn)
        .await?;
        return Ok((row.into(), false));
    }

    let row = sqlx::query_as::<_, CompanyRow>(&format!(
        r"
        INSERT INTO companies (name, website, is_manufacturer, is_vendor)
        VALUES ($1, $2, $3, $4)
        RETURNING {COMPANY_COLUMNS}
        "
    ))
    .bind(name)
    .bind(website)
    .bind(is_manufacturer)
    .bind(is_vendor)
    .fetch_one(&mut *conn)
    .await?;
    Ok((row.into(), true))
}
