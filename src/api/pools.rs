//! Pool API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Pool, PoolRequest};
use crate::AppState;

/// GET /api/pools - List all pools.
pub async fn list_pools(State(state): State<AppState>) -> ApiResult<Vec<Pool>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_pools().await {
        Ok(pools) => success(pools, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/pools/:id - Get a single pool.
pub async fn get_pool(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Pool> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_pool(&id).await {
        Ok(Some(pool)) => success(pool, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Pool {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/pools - Create a new pool.
pub async fn create_pool(
    State(state): State<AppState>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<Pool> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(AppError::validation("Pool name is required"), revision_id);
    }

    match state.repo.create_pool(&request.name).await {
        Ok(pool) => success(pool, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/pools/:id - Rename a pool.
pub async fn update_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<Pool> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(AppError::validation("Pool name is required"), revision_id);
    }

    match state.repo.update_pool(&id, &request.name).await {
        Ok(pool) => success(pool, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/pools/:id - Delete a pool no product uses.
pub async fn delete_pool(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_pool(&id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}
