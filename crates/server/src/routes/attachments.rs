//! Attachment route handlers.
//!
//! Attachments are stored once and linked to any number of owners (parts,
//! storage locations, lots, orders, offers, projects).

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete as delete_route, get, post},
};
use uuid::Uuid;

use makerdb_core::{AttachmentId, AttachmentOwner};

use super::extract::{Json, Pagination, Path, Query};
use crate::db::AttachmentRepository;
use crate::error::{AppError, Result};
use crate::models::attachment::{
    Attachment, AttachmentFilter, AttachmentLink, CreateAttachmentInput,
};
use crate::state::AppState;

/// GET /attachments?owner&owner_id
///
/// `owner_id` only makes sense together with `owner`.
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<AttachmentFilter>,
) -> Result<Json<Vec<Attachment>>> {
    let page = pagination.page()?;
    let repo = AttachmentRepository::new(state.pool());

    let attachments = match (filter.owner, filter.owner_id) {
        (Some(owner), owner_id) => repo.list_for_owner(owner, owner_id, page).await?,
        (None, None) => repo.list(page).await?,
        (None, Some(_)) => {
            return Err(AppError::BadRequest(
                "owner_id requires owner".to_string(),
            ));
        }
    };
    Ok(Json(attachments))
}

/// GET /attachments/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<AttachmentId>,
) -> Result<Json<Attachment>> {
    AttachmentRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Attachment".to_string()))
}

/// POST /attachments
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateAttachmentInput>,
) -> Result<(StatusCode, Json<Attachment>)> {
    input.validate()?;
    let attachment = AttachmentRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// DELETE /attachments/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<AttachmentId>,
) -> Result<StatusCode> {
    AttachmentRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /attachments/{id}/links
pub async fn link(
    State(state): State<AppState>,
    Path(id): Path<AttachmentId>,
    Json(link): Json<AttachmentLink>,
) -> Result<StatusCode> {
    AttachmentRepository::new(state.pool()).link(id, &link).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /attachments/{id}/links/{owner}/{owner_id}
pub async fn unlink(
    State(state): State<AppState>,
    Path((id, owner, owner_id)): Path<(AttachmentId, AttachmentOwner, Uuid)>,
) -> Result<StatusCode> {
    AttachmentRepository::new(state.pool())
        .unlink(id, &AttachmentLink { owner, owner_id })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the attachment routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).delete(delete))
        .route("/{id}/links", post(link))
        .route("/{id}/links/{owner}/{owner_id}", delete_route(unlink))
}
