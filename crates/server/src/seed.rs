//! Database seeding from the `data/` directory.
//!
//! Files:
//! - `companies.json` - `[{"name", "website"?, "is_manufacturer"?, "is_vendor"?}]`
//! - `designators.json` - `[{"code", "name"}]`
//! - `parts.csv` - columns `Name, Inventory, Description, Manufacturer, Designator, Location`
//!
//! Storage locations are generated rather than read. Every step is an upsert,
//! so seeding twice is harmless. A run happens in a single transaction.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::info;

use crate::db::RepositoryError;
use crate::db::companies::{self, find_manufacturer};
use crate::db::designators::{self, find_by_code};
use crate::db::parts::{self, SeedPart};
use crate::db::stock::upsert_for_part_at;
use crate::db::storage::get_or_create_by_name;
use crate::models::designator::MAX_CODE_LEN;

pub const COMPANIES_FILE: &str = "companies.json";
pub const DESIGNATORS_FILE: &str = "designators.json";
pub const PARTS_FILE: &str = "parts.csv";
const DEFAULT_STORAGE: &str = "Default";

/// Errors from seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid row {line}: {message}")]
    InvalidRow { line: u64, message: String },
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

impl From<sqlx::Error> for SeedError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

/// Which data sets to seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOptions {
    pub companies: bool,
    pub designators: bool,
    pub storage: bool,
    pub parts: bool,
}

impl SeedOptions {
    /// Every data set.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            companies: true,
            designators: true,
            storage: true,
            parts: true,
        }
    }

    /// Selecting nothing means everything.
    #[must_use]
    pub const fn or_all(self) -> Self {
        if self.companies || self.designators || self.storage || self.parts {
            self
        } else {
            Self::all()
        }
    }
}

/// Counts of records created (not updated) by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub companies: usize,
    pub designators: usize,
    pub storage: usize,
    pub parts: usize,
    pub stock: usize,
}

/// A company from `companies.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompanyRecord {
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub is_manufacturer: bool,
    #[serde(default)]
    pub is_vendor: bool,
}

/// A designator from `designators.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DesignatorRecord {
    pub code: String,
    pub name: String,
}

/// A row of `parts.csv`, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub name: String,
    pub inventory: i32,
    pub description: String,
    pub manufacturer: String,
    /// Upper-cased, at most three characters.
    pub designator: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct PartCsvRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Inventory", default)]
    inventory: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Manufacturer", default)]
    manufacturer: String,
    #[serde(rename = "Designator", default)]
    designator: String,
    #[serde(rename = "Location", default)]
    location: String,
}

// =============================================================================
// Parsing
// =============================================================================

/// Storage bin codes: `SM0[1-6]-[1-5][A-F]` and `LG0[1-3]-[1-3][A-C]`, sorted.
#[must_use]
pub fn generate_storage_codes() -> Vec<String> {
    let small = (1..=6).flat_map(|shelf| {
        (1..=5).flat_map(move |pos| "ABCDEF".chars().map(move |row| format!("SM0{shelf}-{pos}{row}")))
    });
    let large = (1..=3).flat_map(|shelf| {
        (1..=3).flat_map(move |pos| "ABC".chars().map(move |row| format!("LG0{shelf}-{pos}{row}")))
    });

    let mut codes: Vec<String> = small.chain(large).collect();
    codes.sort();
    codes
}

/// Parse `companies.json`.
pub fn parse_companies(json: &str) -> Result<Vec<CompanyRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse `designators.json`.
pub fn parse_designators(json: &str) -> Result<Vec<DesignatorRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse `parts.csv`. Rows without a name are skipped; a blank inventory
/// counts as zero.
///
/// # Errors
///
/// Returns `SeedError::Csv` for malformed CSV and `SeedError::InvalidRow`
/// for a non-numeric inventory.
pub fn parse_parts_csv<R: Read>(mut reader: R) -> Result<Vec<PartRecord>, SeedError> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(|source| SeedError::Io {
        path: PathBuf::from(PARTS_FILE),
        source,
    })?;
    // Spreadsheet exports often start with a UTF-8 BOM.
    let text = text.trim_start_matches('\u{feff}');

    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = csv.headers()?.clone();
    let mut records = Vec::new();
    for result in csv.records() {
        let record = result?;
        let row: PartCsvRow = record.deserialize(Some(&headers))?;
        if row.name.is_empty() {
            continue;
        }

        let inventory = if row.inventory.is_empty() {
            0
        } else {
            row.inventory.parse().map_err(|_| SeedError::InvalidRow {
                line: record.position().map_or(0, csv::Position::line),
                message: format!("inventory {:?} is not a number", row.inventory),
            })?
        };

        records.push(PartRecord {
            name: row.name,
            inventory,
            description: row.description,
            manufacturer: row.manufacturer,
            designator: row.designator.to_uppercase().chars().take(MAX_CODE_LEN).collect(),
            location: row.location,
        });
    }
    Ok(records)
}

// =============================================================================
// Seeding
// =============================================================================

/// Seed the selected data sets from files in `data_dir`.
///
/// Files are read and parsed before the transaction starts; nothing is
/// written unless every step succeeds.
///
/// # Errors
///
/// Returns `SeedError` if a file is missing or malformed, or a write fails.
pub async fn seed(
    pool: &PgPool,
    options: SeedOptions,
    data_dir: &Path,
) -> Result<SeedReport, SeedError> {
    let options = options.or_all();

    let companies = if options.companies {
        let path = data_dir.join(COMPANIES_FILE);
        parse_companies(&read(&path)?).map_err(|source| SeedError::Json { path, source })?
    } else {
        Vec::new()
    };
    let designators = if options.designators {
        let path = data_dir.join(DESIGNATORS_FILE);
        parse_designators(&read(&path)?).map_err(|source| SeedError::Json { path, source })?
    } else {
        Vec::new()
    };
    let parts = if options.parts {
        let path = data_dir.join(PARTS_FILE);
        parse_parts_csv(read(&path)?.as_bytes())?
    } else {
        Vec::new()
    };

    let mut report = SeedReport::default();
    let mut tx = pool.begin().await?;

    if options.companies {
        report.companies = seed_companies(&mut tx, &companies).await?;
        info!(created = report.companies, total = companies.len(), "Seeded companies");
    }
    if options.designators {
        report.designators = seed_designators(&mut tx, &designators).await?;
        info!(created = report.designators, total = designators.len(), "Seeded designators");
    }
    if options.storage {
        report.storage = seed_storage(&mut tx).await?;
        info!(created = report.storage, "Seeded storage locations");
    }
    if options.parts {
        let (created_parts, created_stock) = seed_parts(&mut tx, &parts).await?;
        report.parts = created_parts;
        report.stock = created_stock;
        info!(
            parts = created_parts,
            stock = created_stock,
            rows = parts.len(),
            "Seeded parts"
        );
    }

    tx.commit().await?;
    Ok(report)
}

fn read(path: &Path) -> Result<String, SeedError> {
    fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn seed_companies(
    conn: &mut PgConnection,
    records: &[CompanyRecord],
) -> Result<usize, SeedError> {
    let mut created = 0;
    for record in records {
        let (_, inserted) = companies::upsert_by_name(
            conn,
            &record.name,
            &record.website,
            record.is_manufacturer,
            record.is_vendor,
        )
        .await?;
        created += usize::from(inserted);
    }
    Ok(created)
}

async fn seed_designators(
    conn: &mut PgConnection,
    records: &[DesignatorRecord],
) -> Result<usize, SeedError> {
    let mut created = 0;
    for record in records {
        let (_, inserted) = designators::upsert_by_code(conn, &record.code, &record.name).await?;
        created += usize::from(inserted);
    }
    Ok(created)
}

async fn seed_storage(conn: &mut PgConnection) -> Result<usize, SeedError> {
    let mut created = 0;
    for code in generate_storage_codes() {
        let (_, inserted) =
            get_or_create_by_name(conn, &code, &format!("Storage bin: {code}")).await?;
        created += usize::from(inserted);
    }
    Ok(created)
}

/// Returns `(parts created, stock entries created)`.
async fn seed_parts(
    conn: &mut PgConnection,
    records: &[PartRecord],
) -> Result<(usize, usize), SeedError> {
    let (default_storage, _) =
        get_or_create_by_name(conn, DEFAULT_STORAGE, "Default storage location").await?;

    let mut created_parts = 0;
    let mut created_stock = 0;
    for record in records {
        let designator_id = if record.designator.is_empty() {
            None
        } else {
            find_by_code(conn, &record.designator).await?
        };
        let manufacturer_id = if record.manufacturer.is_empty() {
            None
        } else {
            find_manufacturer(conn, &record.manufacturer).await?
        };

        let (part_id, inserted) = parts::upsert_by_name(
            conn,
            SeedPart {
                name: &record.name,
                description: &record.description,
                designator_id,
                manufacturer_id,
            },
        )
        .await?;
        created_parts += usize::from(inserted);

        if record.inventory > 0 {
            let storage_id = if record.location.is_empty() {
                default_storage
            } else {
                let description = format!("Storage location: {}", record.location);
                get_or_create_by_name(conn, &record.location, &description).await?.0
            };
            let inserted = upsert_for_part_at(conn, part_id, storage_id, record.inventory).await?;
            created_stock += usize::from(inserted);
        }
    }
    Ok((created_parts, created_stock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_codes() {
        let codes = generate_storage_codes();
        assert_eq!(codes.len(), 207);
        assert_eq!(codes.first().map(String::as_str), Some("LG01-1A"));
        assert_eq!(codes.last().map(String::as_str), Some("SM06-5F"));
        assert!(codes.contains(&"SM03-2D".to_string()));
        assert!(!codes.contains(&"LG01-1D".to_string()));
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_options_default_to_all() {
        assert_eq!(SeedOptions::default().or_all(), SeedOptions::all());
        let parts_only = SeedOptions {
            parts: true,
            ..SeedOptions::default()
        };
        assert_eq!(parts_only.or_all(), parts_only);
    }

    #[test]
    fn test_parse_companies_defaults() {
        let companies = parse_companies(
            r#"[{"name": "Yageo", "is_manufacturer": true}, {"name": "Mouser", "website": "https://mouser.com", "is_vendor": true}]"#,
        )
        .expect("parse");
        assert_eq!(companies.len(), 2);
        assert!(companies[0].is_manufacturer);
        assert!(!companies[0].is_vendor);
        assert_eq!(companies[0].website, "");
        assert_eq!(companies[1].website, "https://mouser.com");
    }

    #[test]
    fn test_parse_designators() {
        let designators =
            parse_designators(r#"[{"code": "R", "name": "Resistor"}]"#).expect("parse");
        assert_eq!(
            designators,
            vec![DesignatorRecord {
                code: "R".to_string(),
                name: "Resistor".to_string()
            }]
        );
        assert!(parse_designators(r#"[{"code": "R"}]"#).is_err());
    }

    #[test]
    fn test_parse_parts_csv() {
        let csv = "\u{feff}Name,Inventory,Description,Manufacturer,Designator,Location\n\
                   10k 0603, 250 ,Thick film,Yageo,res,SM01-1A\n\
                   ,5,No name,,,\n\
                   LM358,,Op amp,TI,u,\n";
        let parts = parse_parts_csv(csv.as_bytes()).expect("parse");

        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            PartRecord {
                name: "10k 0603".to_string(),
                inventory: 250,
                description: "Thick film".to_string(),
                manufacturer: "Yageo".to_string(),
                designator: "RES".to_string(),
                location: "SM01-1A".to_string(),
            }
        );
        assert_eq!(parts[1].inventory, 0);
        assert_eq!(parts[1].designator, "U");
        assert_eq!(parts[1].location, "");
    }

    #[test]
    fn test_parse_parts_truncates_designator() {
        let csv = "Name,Designator\nCrystal,xtal\n";
        let parts = parse_parts_csv(csv.as_bytes()).expect("parse");
        assert_eq!(parts[0].designator, "XTA");
        assert_eq!(parts[0].inventory, 0);
    }

    #[test]
    fn test_parse_parts_rejects_bad_inventory() {
        let csv = "Name,Inventory\nR1,lots\n";
        let err = parse_parts_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SeedError::InvalidRow { line: 2, .. }));
    }
}
