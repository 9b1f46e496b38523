//! Company route handlers.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};
use tracing::instrument;

use makerdb_core::CompanyId;

use super::extract::{Json, Pagination, Path, Query};
use crate::db::CompanyRepository;
use crate::error::{AppError, Result};
use crate::models::company::{Company, CompanyFilter, CreateCompanyInput, UpdateCompanyInput};
use crate::state::AppState;

/// GET /companies
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Vec<Company>>> {
    let page = pagination.page()?;
    let companies = CompanyRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(companies))
}

/// GET /companies/count
#[instrument(skip(state))]
pub async fn count(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Value>> {
    let count = CompanyRepository::new(state.pool()).count(&filter).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /companies/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
) -> Result<Json<Company>> {
    CompanyRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Company".to_string()))
}

/// POST /companies
#[instrument(skip(state, input), fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCompanyInput>,
) -> Result<(StatusCode, Json<Company>)> {
    input.validate()?;
    let company = CompanyRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// PUT /companies/{id}
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
    Json(input): Json<UpdateCompanyInput>,
) -> Result<Json<Company>> {
    input.validate()?;
    let company = CompanyRepository::new(state.pool()).update(id, &input).await?;
    Ok(Json(company))
}

/// DELETE /companies/{id}
///
/// Fails with 409 while parts, orders or offers still reference the company.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
) -> Result<StatusCode> {
    CompanyRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the company routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/count", get(count))
        .route("/{id}", get(show).put(update).delete(delete))
}
