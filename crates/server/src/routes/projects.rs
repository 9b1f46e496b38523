//! Project and BOM route handlers.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use makerdb_core::stock::build_report;
use makerdb_core::{BomItemId, ProjectId};

use super::extract::{Json, Pagination, Path, Query};
use crate::db::{ProjectRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::project::{
    AvailabilityQuery, BomItem, CreateBomItemInput, CreateProjectInput, Project,
    ProjectAvailability, ProjectFilter, UpdateBomItemInput, UpdateProjectInput,
};
use crate::state::AppState;

/// Largest build count accepted by the availability check.
const MAX_BUILDS: u32 = 1_000_000;

async fn require_project(state: &AppState, id: ProjectId) -> Result<Project> {
    ProjectRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))
}

/// GET /projects?status
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<Vec<Project>>> {
    let page = pagination.page()?;
    Ok(Json(
        ProjectRepository::new(state.pool()).list(&filter, page).await?,
    ))
}

/// GET /projects/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Result<Json<Project>> {
    Ok(Json(require_project(&state, id).await?))
}

/// POST /projects
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>)> {
    input.validate()?;
    let project = ProjectRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /projects/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Json<Project>> {
    input.validate()?;
    Ok(Json(
        ProjectRepository::new(state.pool()).update(id, &input).await?,
    ))
}

/// DELETE /projects/{id}
///
/// Removes the BOM with the project.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Result<StatusCode> {
    ProjectRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// BOM
// =============================================================================

/// GET /projects/{id}/bom
pub async fn bom(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Result<Json<Vec<BomItem>>> {
    require_project(&state, id).await?;
    Ok(Json(ProjectRepository::new(state.pool()).bom(id).await?))
}

/// POST /projects/{id}/bom
#[instrument(skip(state, input), fields(part_id = %input.part_id))]
pub async fn create_item(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(input): Json<CreateBomItemInput>,
) -> Result<(StatusCode, Json<BomItem>)> {
    input.validate()?;
    let item = ProjectRepository::new(state.pool())
        .create_item(id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /projects/{id}/bom/{item_id}
pub async fn update_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(ProjectId, BomItemId)>,
    Json(input): Json<UpdateBomItemInput>,
) -> Result<Json<BomItem>> {
    input.validate()?;
    Ok(Json(
        ProjectRepository::new(state.pool())
            .update_item(id, item_id, &input)
            .await?,
    ))
}

/// DELETE /projects/{id}/bom/{item_id}
pub async fn delete_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(ProjectId, BomItemId)>,
) -> Result<StatusCode> {
    ProjectRepository::new(state.pool())
        .delete_item(id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/availability?builds=N
///
/// Checks the BOM against on-hand stock of its parts and substitutes,
/// including attrition. Stock shared between lines is counted once.
#[instrument(skip(state))]
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ProjectAvailability>> {
    if !(1..=MAX_BUILDS).contains(&query.builds) {
        return Err(AppError::BadRequest(format!(
            "builds must be between 1 and {MAX_BUILDS}"
        )));
    }
    require_project(&state, id).await?;

    let repo = ProjectRepository::new(state.pool());
    let lines = repo.bom_lines(id).await?;
    let stock = repo.bom_stock(id).await?;
    let report = build_report(&lines, &stock, query.builds).map_err(RepositoryError::from)?;

    Ok(Json(ProjectAvailability {
        project_id: id,
        report,
    }))
}

/// Create the project routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/bom", get(bom).post(create_item))
        .route("/{id}/bom/{item_id}", put(update_item).delete(delete_item))
        .route("/{id}/availability", get(availability))
}
