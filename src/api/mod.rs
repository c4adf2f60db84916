//! REST API module.
//!
//! Operator handlers live under `/api`; the guardian signing page uses `/public`.

mod datastore;
mod health_declarations;
mod participants;
mod payments;
mod pools;
mod products;
mod registrations;
mod reports;
mod search;
mod seasons;

pub use datastore::*;
pub use health_declarations::*;
pub use participants::*;
pub use payments::*;
pub use pools::*;
pub use products::*;
pub use registrations::*;
pub use reports::*;
pub use search::*;
pub use seasons::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Revision after a successful write, falling back to the one read before it.
pub(crate) async fn revision_after_write(state: &crate::AppState, before: i64) -> i64 {
    state.repo.get_revision_id().await.unwrap_or(before)
}
