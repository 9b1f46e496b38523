//! Database operations for attachments and their owner links.
//!
//! Each owner kind has its own join table (`part_attachments`,
//! `storage_attachments`, ...) with `(owner_id, attachment_id)` columns.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use makerdb_core::{AttachmentId, AttachmentOwner, AttachmentType};

use super::{Page, RepositoryError, map_constraint};
use crate::models::attachment::{Attachment, AttachmentLink, CreateAttachmentInput};

const ATTACHMENT_COLUMNS: &str =
    "a.id, a.file_type, a.filename, a.content_type, a.size, a.file, a.created_at, a.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: AttachmentId,
    file_type: AttachmentType,
    filename: String,
    content_type: String,
    size: i32,
    file: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            file_type: row.file_type,
            filename: row.filename,
            content_type: row.content_type,
            size: row.size,
            file: row.file,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Join table and owner table for an owner kind.
const fn link_tables(owner: AttachmentOwner) -> (&'static str, &'static str) {
    match owner {
        AttachmentOwner::Part => ("part_attachments", "parts"),
        AttachmentOwner::Storage => ("storage_attachments", "storage"),
        AttachmentOwner::Lot => ("lot_attachments", "lots"),
        AttachmentOwner::Order => ("order_attachments", "orders"),
        AttachmentOwner::Offer => ("offer_attachments", "offers"),
        AttachmentOwner::Project => ("project_attachments", "projects"),
    }
}

/// Repository for attachment database operations.
pub struct AttachmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttachmentRepository<'a> {
    /// Create a new attachment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List attachments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: Page) -> Result<Vec<Attachment>, RepositoryError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            r"
            SELECT {ATTACHMENT_COLUMNS}
            FROM attachments a
            ORDER BY a.created_at DESC, a.id
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List attachments linked to one owner, or to any owner of a kind when
    /// `owner_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_owner(
        &self,
        owner: AttachmentOwner,
        owner_id: Option<Uuid>,
        page: Page,
    ) -> Result<Vec<Attachment>, RepositoryError> {
        let (join_table, _) = link_tables(owner);
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            r"
            SELECT DISTINCT {ATTACHMENT_COLUMNS}
            FROM attachments a
            JOIN {join_table} l ON l.attachment_id = a.id
            WHERE ($1::uuid IS NULL OR l.owner_id = $1)
            ORDER BY a.created_at DESC, a.id
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(owner_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an attachment by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AttachmentId) -> Result<Option<Attachment>, RepositoryError> {
        let row = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create an attachment record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        input: &CreateAttachmentInput,
    ) -> Result<Attachment, RepositoryError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r"
            INSERT INTO attachments AS a (file_type, filename, content_type, size, file)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING a.id, a.file_type, a.filename, a.content_type, a.size, a.file,
                      a.created_at, a.updated_at
            ",
        )
        .bind(input.file_type)
        .bind(&input.filename)
        .bind(&input.content_type)
        .bind(input.size)
        .bind(input.file.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint(e, "attachment"))?;

        Ok(row.into())
    }

    /// Delete an attachment and all of its links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attachment does not exist.
    pub async fn delete(&self, id: AttachmentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Link an attachment to an owner. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attachment or owner does not exist.
    pub async fn link(
        &self,
        id: AttachmentId,
        link: &AttachmentLink,
    ) -> Result<(), RepositoryError> {
        let (join_table, owner_table) = link_tables(link.owner);

        let (owner_exists,): (bool,) =
            sqlx::query_as(&format!("SELECT EXISTS(SELECT 1 FROM {owner_table} WHERE id = $1)"))
                .bind(link.owner_id)
                .fetch_one(self.pool)
                .await?;
        if !owner_exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(&format!(
            r"
            INSERT INTO {join_table} (owner_id, attachment_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "
        ))
        .bind(link.owner_id)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| match map_constraint(e, "attachment link") {
            // The owner was checked above, so a dangling reference is the attachment.
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })?;

        Ok(())
    }

    /// Remove the link between an attachment and an owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such link exists.
    pub async fn unlink(
        &self,
        id: AttachmentId,
        link: &AttachmentLink,
    ) -> Result<(), RepositoryError> {
        let (join_table, _) = link_tables(link.owner);
        let result = sqlx::query(&format!(
            "DELETE FROM {join_table} WHERE owner_id = $1 AND attachment_id = $2"
        ))
        .bind(link.owner_id)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_owner_has_link_table() {
        for owner in AttachmentOwner::ALL {
            let (join_table, owner_table) = link_tables(*owner);
            assert!(join_table.ends_with("_attachments"));
            assert!(!owner_table.is_empty());
        }
        assert_eq!(link_tables(AttachmentOwner::Storage).1, "storage");
    }
}
