//! Health declaration endpoints.
//!
//! Operators create signing links and record decisions under `/api`. Guardians
//! open the link and sign under `/public`, identified only by the token.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, revision_after_write, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    CreateDeclarationRequest, DeclarationSubmission, HealthDeclaration,
    PublicDeclarationForm, UpdateDeclarationStatusRequest,
};
use crate::AppState;

/// GET /api/health-declarations - List all declarations.
pub async fn list_declarations(State(state): State<AppState>) -> ApiResult<Vec<HealthDeclaration>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_declarations().await {
        Ok(declarations) => success(declarations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/health-declarations - Create (or reuse) the signing link of a registration.
pub async fn create_declaration(
    State(state): State<AppState>,
    Json(request): Json<CreateDeclarationRequest>,
) -> ApiResult<HealthDeclaration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.registration_id.trim().is_empty() {
        return error(AppError::validation("Registration is required"), revision_id);
    }

    match state
        .repo
        .create_declaration_for_registration(&request.registration_id)
        .await
    {
        Ok(declaration) => success(declaration, revision_after_write(&state, revision_id).await),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/health-declarations/:id/status - Record an operator decision.
pub async fn update_declaration_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDeclarationStatusRequest>,
) -> ApiResult<HealthDeclaration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state
        .repo
        .update_declaration_status(&id, request.form_status, request.notes.as_deref())
        .await
    {
        Ok(declaration) => {
            sync_health_approval(&state, &declaration).await;
            success(declaration, revision_after_write(&state, revision_id).await)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /public/health-declarations/:token - What the signing page displays.
pub async fn get_public_declaration(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<PublicDeclarationForm> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let declaration = match state.repo.get_declaration_by_token(&token).await {
        Ok(Some(declaration)) => declaration,
        Ok(None) => {
            return error(
                AppError::NotFound("Health declaration link not found".to_string()),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    match public_form(&state, declaration).await {
        Ok(form) => success(form, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /public/health-declarations/:token - Guardian signs the declaration.
pub async fn submit_public_declaration(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(submission): Json<DeclarationSubmission>,
) -> ApiResult<PublicDeclarationForm> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if !submission.agreement {
        return error(
            AppError::validation("The health declaration must be agreed to"),
            revision_id,
        );
    }
    if submission.signature.trim().is_empty() {
        return error(AppError::validation("Signature is required"), revision_id);
    }
    if submission.parent_name.trim().is_empty() {
        return error(AppError::validation("Parent name is required"), revision_id);
    }

    let declaration = match state.repo.submit_declaration(&token, &submission).await {
        Ok(declaration) => declaration,
        Err(e) => return error(e, revision_id),
    };
    tracing::info!("Health declaration {} signed", declaration.id);

    sync_health_approval(&state, &declaration).await;
    let new_revision = revision_after_write(&state, revision_id).await;

    match public_form(&state, declaration).await {
        Ok(form) => success(form, new_revision),
        Err(e) => error(e, new_revision),
    }
}

/// Mirror the declaration status onto the participant's cached flag.
async fn sync_health_approval(state: &AppState, declaration: &HealthDeclaration) {
    let Some(approved) = declaration.form_status.health_approval() else {
        return;
    };

    let participant_id = match state.repo.resolve_declaration_participant(declaration).await {
        Ok(Some(participant_id)) => participant_id,
        Ok(None) => {
            tracing::warn!(
                "Declaration {} does not resolve to a participant",
                declaration.id
            );
            return;
        }
        Err(e) => {
            tracing::warn!("Failed to resolve declaration {}: {}", declaration.id, e);
            return;
        }
    };

    if let Err(e) = state
        .repo
        .set_health_approval(&participant_id, approved)
        .await
    {
        tracing::warn!(
            "Failed to update health approval of participant {}: {}",
            participant_id,
            e
        );
    }
}

async fn public_form(
    state: &AppState,
    declaration: HealthDeclaration,
) -> Result<PublicDeclarationForm, AppError> {
    let participant_name = match state.repo.resolve_declaration_participant(&declaration).await? {
        Some(participant_id) => state
            .repo
            .get_participant(&participant_id)
            .await?
            .map(|p| p.full_name())
            .unwrap_or_default(),
        None => String::new(),
    };

    let product_name = match &declaration.registration_id {
        Some(registration_id) => match state.repo.get_registration(registration_id).await? {
            Some(registration) => state
                .repo
                .get_product(&registration.product_id)
                .await?
                .map(|p| p.name),
            None => None,
        },
        None => None,
    };

    Ok(PublicDeclarationForm {
        token: declaration.token,
        form_status: declaration.form_status,
        participant_name,
        product_name,
    })
}
