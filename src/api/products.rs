//! Product API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateProductRequest, Product, ProductFilter, UpdateProductRequest};
use crate::schedule::{calculate_meeting_progress, MeetingProgress, Schedule};
use crate::AppState;

/// Query parameters for meeting progress.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    /// Defaults to today (UTC).
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// GET /api/products - List products, optionally by season and pool.
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Vec<Product>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_products(&filter).await {
        Ok(products) => success(products, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/products/:id - Get a single product.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_product(&id).await {
        Ok(Some(product)) => success(product, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Product {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/products - Create a new product.
pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<Product> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(AppError::validation("Product name is required"), revision_id);
    }
    if let Err(e) = validate_terms(Some(request.price), Some(request.max_participants)) {
        return error(e, revision_id);
    }

    match state.repo.create_product(&request).await {
        Ok(product) => success(product, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/products/:id - Update a product.
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Product> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return error(AppError::validation("Product name cannot be empty"), revision_id);
    }
    if let Err(e) = validate_terms(request.price, request.max_participants) {
        return error(e, revision_id);
    }

    match state.repo.update_product(&id, &request).await {
        Ok(product) => success(product, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/products/:id - Delete a product without registrations.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_product(&id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/products/:id/progress - Meetings held so far.
pub async fn get_product_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<MeetingProgress> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let product = match state.repo.get_product(&id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Product {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    success(
        calculate_meeting_progress(&Schedule::of(&product), as_of),
        revision_id,
    )
}

fn validate_terms(price: Option<f64>, max_participants: Option<i64>) -> Result<(), AppError> {
    if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(AppError::validation("Price must be a non-negative number"));
    }
    if max_participants.is_some_and(|m| m < 0) {
        return Err(AppError::validation("Max participants cannot be negative"));
    }
    Ok(())
}
