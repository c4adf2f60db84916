//! Payment API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreatePaymentRequest, Payment};
use crate::AppState;

/// POST /api/payments - Record a payment.
///
/// Each call records a new row, even for an identical request.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if !request.amount.is_finite() || request.amount <= 0.0 {
        return error(
            AppError::validation("Payment amount must be greater than zero"),
            revision_id,
        );
    }
    if request.receipt_number.trim().is_empty() {
        return error(AppError::validation("Receipt number is required"), revision_id);
    }

    match state.repo.create_payment(&request).await {
        Ok(payment) => success(payment, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/payments/:id - Delete a payment.
pub async fn delete_payment(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_payment(&id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}
