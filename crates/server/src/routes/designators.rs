//! Designator route handlers.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};

use makerdb_core::DesignatorId;

use super::extract::{Json, Path};
use crate::db::DesignatorRepository;
use crate::error::{AppError, Result};
use crate::models::designator::{CreateDesignatorInput, Designator, UpdateDesignatorInput};
use crate::state::AppState;

/// GET /designators
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Designator>>> {
    Ok(Json(DesignatorRepository::new(state.pool()).list().await?))
}

/// GET /designators/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<DesignatorId>,
) -> Result<Json<Designator>> {
    DesignatorRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Designator".to_string()))
}

/// POST /designators
///
/// Codes are unique; a duplicate is a 409.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateDesignatorInput>,
) -> Result<(StatusCode, Json<Designator>)> {
    input.validate()?;
    let designator = DesignatorRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(designator)))
}

/// PUT /designators/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DesignatorId>,
    Json(input): Json<UpdateDesignatorInput>,
) -> Result<Json<Designator>> {
    input.validate()?;
    Ok(Json(
        DesignatorRepository::new(state.pool()).update(id, &input).await?,
    ))
}

/// DELETE /designators/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DesignatorId>,
) -> Result<StatusCode> {
    DesignatorRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the designator routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}
