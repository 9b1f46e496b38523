//! Projects and their bills of materials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use makerdb_core::stock::BuildReport;
use makerdb_core::{BomItemId, PartId, ProjectId, ProjectStatus};

use super::{CustomFields, MAX_NAME_LEN, ValidationError, limit_text, non_negative, require_text};

const DEFAULT_REVISION: &str = "1.0";

/// A project (something that gets built from a BOM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub status: ProjectStatus,
    pub revision: String,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing projects.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
}

/// Input for creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default = "default_revision")]
    pub revision: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

impl CreateProjectInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name, MAX_NAME_LEN)?;
        require_text("revision", &self.revision, 50)
    }
}

/// Input for updating a project.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ProjectStatus>,
    pub revision: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateProjectInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LEN)?;
        }
        if let Some(revision) = &self.revision {
            require_text("revision", revision, 50)?;
        }
        Ok(())
    }
}

/// A BOM line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomItem {
    pub id: BomItemId,
    pub project_id: ProjectId,
    pub part_id: PartId,
    pub part_name: String,
    /// Quantity per build.
    pub quantity: i32,
    /// Comma-separated reference designators, e.g. `R1, R2`.
    pub designators: String,
    /// Parts accepted in place of `part_id` on this line.
    pub substitute_ids: Vec<PartId>,
    pub tags: Vec<String>,
    pub custom_fields: CustomFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BomItem {
    /// Individual reference designators of this line.
    #[must_use]
    pub fn designator_list(&self) -> Vec<&str> {
        split_designators(&self.designators)
    }
}

/// Split a comma-separated designator list, dropping blanks.
#[must_use]
pub fn split_designators(designators: &str) -> Vec<&str> {
    designators
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect()
}

/// Input for adding a BOM line.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBomItemInput {
    pub part_id: PartId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub designators: String,
    #[serde(default)]
    pub substitute_ids: Vec<PartId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

const fn default_quantity() -> i32 {
    1
}

impl CreateBomItemInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("quantity", self.quantity)?;
        limit_text("designators", &self.designators, 10_000)?;
        validate_substitutes(self.part_id, &self.substitute_ids)
    }
}

/// Input for updating a BOM line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBomItemInput {
    pub part_id: Option<PartId>,
    pub quantity: Option<i32>,
    pub designators: Option<String>,
    /// Replaces the whole substitute set when present.
    pub substitute_ids: Option<Vec<PartId>>,
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<CustomFields>,
}

impl UpdateBomItemInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(q) = self.quantity {
            non_negative("quantity", q)?;
        }
        if let (Some(part_id), Some(subs)) = (self.part_id, &self.substitute_ids) {
            validate_substitutes(part_id, subs)?;
        }
        Ok(())
    }
}

fn validate_substitutes(part_id: PartId, substitutes: &[PartId]) -> Result<(), ValidationError> {
    if substitutes.contains(&part_id) {
        return Err(ValidationError::new(
            "substitute_ids",
            "a line cannot list its own part as a substitute",
        ));
    }
    Ok(())
}

/// Query for BOM availability.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default = "default_builds")]
    pub builds: u32,
}

const fn default_builds() -> u32 {
    1
}

/// Whether a project can be built from on-hand stock.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAvailability {
    pub project_id: ProjectId,
    #[serde(flatten)]
    pub report: BuildReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults() {
        let input: CreateProjectInput =
            serde_json::from_str(r#"{"name": "Synth"}"#).expect("parse");
        assert_eq!(input.revision, "1.0");
        assert_eq!(input.status, ProjectStatus::Draft);
    }

    #[test]
    fn test_bom_item_defaults_to_one() {
        let input: CreateBomItemInput =
            serde_json::from_str(r#"{"part_id": "00000000-0000-0000-0000-000000000001"}"#)
                .expect("parse");
        assert_eq!(input.quantity, 1);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_line_cannot_substitute_itself() {
        let part_id = PartId::new_v4();
        let input = CreateBomItemInput {
            part_id,
            quantity: 2,
            designators: String::new(),
            substitute_ids: vec![part_id],
            tags: Vec::new(),
            custom_fields: CustomFields::new(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_split_designators() {
        assert_eq!(split_designators("R1, R2,,R3 "), vec!["R1", "R2", "R3"]);
        assert!(split_designators("").is_empty());
    }
}
