//! Participant search endpoint.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::models::Participant;
use crate::AppState;

const MAX_SEARCH_LIMIT: usize = 100;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub participant: Participant,
    pub score: f32,
}

/// GET /api/participants/search?q= - Find participants by name, ID number or phone.
pub async fn search_participants(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<SearchResultItem>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let hits = match state
        .search
        .search(&params.q, params.limit.min(MAX_SEARCH_LIMIT))
    {
        Ok(hits) => hits,
        Err(e) => return error(e, revision_id),
    };

    // Hits whose participant was deleted since indexing are skipped.
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        match state.repo.get_participant(&hit.participant_id).await {
            Ok(Some(participant)) => results.push(SearchResultItem {
                participant,
                score: hit.score,
            }),
            Ok(None) => {}
            Err(e) => return error(e, revision_id),
        }
    }

    success(results, revision_id)
}
