//! Datastore API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::errors::AppErrorWithRevision;
use crate::models::RevisionInfo;
use crate::AppState;

/// GET /api/datastore/revision - Get the current revision info.
///
/// Dashboards poll this to decide whether to refetch.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_info = state
        .repo
        .get_revision_info()
        .await
        .map_err(|error| AppErrorWithRevision {
            error,
            revision_id: 0,
        })?;

    let revision_id = revision_info.revision_id;
    success(revision_info, revision_id)
}
