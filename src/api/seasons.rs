//! Season API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSeasonRequest, LinkPoolRequest, Pool, Season, UpdateSeasonRequest};
use crate::AppState;

/// GET /api/seasons - List all seasons.
pub async fn list_seasons(State(state): State<AppState>) -> ApiResult<Vec<Season>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_seasons().await {
        Ok(seasons) => success(seasons, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/seasons/:id - Get a single season.
pub async fn get_season(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Season> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_season(&id).await {
        Ok(Some(season)) => success(season, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Season {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/seasons - Create a new season.
pub async fn create_season(
    State(state): State<AppState>,
    Json(request): Json<CreateSeasonRequest>,
) -> ApiResult<Season> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(AppError::validation("Season name is required"), revision_id);
    }

    match state.repo.create_season(&request).await {
        Ok(season) => success(season, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/seasons/:id - Update a season.
pub async fn update_season(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSeasonRequest>,
) -> ApiResult<Season> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return error(AppError::validation("Season name cannot be empty"), revision_id);
    }

    match state.repo.update_season(&id, &request).await {
        Ok(season) => success(season, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/seasons/:id - Delete a season without products.
pub async fn delete_season(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_season(&id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/seasons/:id/pools - Pools used in a season.
pub async fn list_season_pools(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Pool>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_season_pools(&id).await {
        Ok(pools) => success(pools, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/seasons/:id/pools - Link a pool to a season.
pub async fn link_season_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LinkPoolRequest>,
) -> ApiResult<Vec<Pool>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = state.repo.link_pool_to_season(&id, &request.pool_id).await {
        return error(e, revision_id);
    }

    let new_revision = revision_after_write(&state, revision_id).await;
    match state.repo.list_season_pools(&id).await {
        Ok(pools) => success(pools, new_revision),
        Err(e) => error(e, new_revision),
    }
}

/// DELETE /api/seasons/:id/pools/:pool_id - Unlink a pool from a season.
pub async fn unlink_season_pool(
    State(state): State<AppState>,
    Path((id, pool_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.unlink_pool_from_season(&id, &pool_id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}
