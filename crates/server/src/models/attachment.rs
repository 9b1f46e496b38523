//! File attachments and their links to owning entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use makerdb_core::{AttachmentId, AttachmentOwner, AttachmentType};

use super::{MAX_NAME_LEN, ValidationError, limit_text, require_text};

/// An attachment (image, datasheet, CAD file, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub file_type: AttachmentType,
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: i32,
    /// Storage URL or path of the file, if uploaded.
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing attachments by owner.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AttachmentFilter {
    pub owner: Option<AttachmentOwner>,
    pub owner_id: Option<Uuid>,
}

/// Input for creating an attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAttachmentInput {
    #[serde(default)]
    pub file_type: AttachmentType,
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: i32,
    pub file: Option<String>,
}

impl CreateAttachmentInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("filename", &self.filename, MAX_NAME_LEN)?;
        limit_text("content_type", &self.content_type, 100)?;
        super::non_negative("size", self.size)
    }
}

/// Link between an attachment and the entity that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentLink {
    pub owner: AttachmentOwner,
    pub owner_id: Uuid,
}
