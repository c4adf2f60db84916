//! Participant API endpoints.
//!
//! Writes keep the participant search index in step; index failures are
//! logged and never fail the request.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateParticipantRequest, Participant, UpdateParticipantRequest};
use crate::AppState;

/// GET /api/participants - List all participants.
pub async fn list_participants(State(state): State<AppState>) -> ApiResult<Vec<Participant>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_participants().await {
        Ok(participants) => success(participants, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/participants/:id - Get a single participant.
pub async fn get_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Participant> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_participant(&id).await {
        Ok(Some(participant)) => success(participant, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Participant {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/participants - Create a new participant.
pub async fn create_participant(
    State(state): State<AppState>,
    Json(request): Json<CreateParticipantRequest>,
) -> ApiResult<Participant> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return error(
            AppError::validation("First and last name are required"),
            revision_id,
        );
    }

    match state.repo.create_participant(&request).await {
        Ok(participant) => {
            if let Err(e) = state.search.index_participant(&participant).await {
                tracing::warn!("Failed to index participant: {}", e);
            }
            success(participant, revision_after_write(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/participants/:id - Update a participant.
pub async fn update_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateParticipantRequest>,
) -> ApiResult<Participant> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&request.first_name) || blank(&request.last_name) {
        return error(AppError::validation("Names cannot be empty"), revision_id);
    }

    match state.repo.update_participant(&id, &request).await {
        Ok(participant) => {
            if let Err(e) = state.search.index_participant(&participant).await {
                tracing::warn!("Failed to re-index participant: {}", e);
            }
            success(participant, revision_after_write(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/participants/:id - Delete a participant without registrations.
pub async fn delete_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_participant(&id).await {
        Ok(()) => {
            if let Err(e) = state.search.remove_participant(&id).await {
                tracing::warn!("Failed to remove participant from index: {}", e);
            }
            success((), revision_after_write(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}
