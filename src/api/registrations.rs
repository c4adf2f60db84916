//! Registration API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

use super::{error, revision_after_write, success, ApiResult};
use crate::balance::{Balance, PaidAmount};
use crate::errors::AppError;
use crate::matcher::{find_declaration_for_registration, MatchStrategy};
use crate::models::{
    ApplyDiscountRequest, CreateRegistrationRequest, HealthDeclaration, Payment, Registration,
    RegistrationFilter, UpdateRegistrationRequest,
};
use crate::AppState;

/// Declaration found for a registration and the strategy that found it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationLookup {
    pub declaration: HealthDeclaration,
    pub matched_by: MatchStrategy,
    /// True only when the declaration is keyed on this registration. Participant
    /// and heuristic matches are false; such rows are candidates for migration.
    pub exact: bool,
}

/// A registration's payment rows and the balance they add up to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatement {
    pub registration_id: String,
    pub payments: Vec<Payment>,
    pub balance: Balance,
}

/// GET /api/registrations - List registrations.
pub async fn list_registrations(
    State(state): State<AppState>,
    Query(filter): Query<RegistrationFilter>,
) -> ApiResult<Vec<Registration>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_registrations(&filter).await {
        Ok(registrations) => success(registrations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/registrations/:id - Get a single registration.
pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_registration(&id).await {
        Ok(Some(registration)) => success(registration, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Registration {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/registrations - Register a participant to a product.
pub async fn create_registration(
    State(state): State<AppState>,
    Json(request): Json<CreateRegistrationRequest>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.product_id.trim().is_empty() || request.participant_id.trim().is_empty() {
        return error(
            AppError::validation("Product and participant are required"),
            revision_id,
        );
    }

    match state.repo.create_registration(&request).await {
        Ok(registration) => success(registration, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/registrations/:id - Update a registration.
pub async fn update_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRegistrationRequest>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.update_registration(&id, &request).await {
        Ok(registration) => success(registration, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/registrations/:id - Delete a registration without payments.
pub async fn delete_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.delete_registration(&id).await {
        Ok(()) => success((), revision_after_write(&state, revision_id).await),
        Err(e) => {
            if let AppError::HasDependents { dependents, .. } = &e {
                tracing::info!(
                    "Refused to delete registration {} with {} payments",
                    id,
                    dependents
                );
            }
            error(e, revision_id)
        }
    }
}

/// POST /api/registrations/:id/discount - Approve an additional discount.
pub async fn apply_discount(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ApplyDiscountRequest>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if !request.amount.is_finite() || request.amount <= 0.0 {
        return error(
            AppError::validation("Discount amount must be greater than zero"),
            revision_id,
        );
    }

    match state.repo.apply_discount(&id, request.amount).await {
        Ok(registration) => success(registration, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/registrations/:id/payments - Payments of a registration with the resulting balance.
pub async fn list_registration_payments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PaymentStatement> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let registration = match state.repo.get_registration(&id).await {
        Ok(Some(registration)) => registration,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Registration {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    match state.repo.list_payments_for_registration(&id).await {
        Ok(payments) => {
            let balance = Balance::compute(
                registration.required_amount,
                &registration.discount,
                PaidAmount::Payments(&payments),
            );
            success(
                PaymentStatement {
                    registration_id: id,
                    payments,
                    balance,
                },
                revision_id,
            )
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/registrations/:id/health-declaration - Resolve the registration's declaration.
///
/// Answers `data: null` when no declaration exists yet.
pub async fn get_registration_declaration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Option<DeclarationLookup>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    // Without the registration only the id-based strategies can run.
    let participant_id = match state.repo.get_registration(&id).await {
        Ok(registration) => registration.map(|r| r.participant_id),
        Err(e) => {
            tracing::warn!("Could not load registration {} for lookup: {}", id, e);
            None
        }
    };

    let declarations = match state.repo.list_declarations().await {
        Ok(declarations) => declarations,
        Err(e) => return error(e, revision_id),
    };

    let lookup = find_declaration_for_registration(&id, participant_id.as_deref(), &declarations)
        .map(|m| {
            if !m.strategy.is_exact() {
                tracing::info!(
                    "Declaration {} matched registration {} by {:?}",
                    m.declaration.id,
                    id,
                    m.strategy
                );
            }
            DeclarationLookup {
                declaration: m.declaration.clone(),
                matched_by: m.strategy,
                exact: m.strategy.is_exact(),
            }
        });

    success(lookup, revision_id)
}
