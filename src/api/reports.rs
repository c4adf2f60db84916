//! Report endpoints: CSV export and the financial summary.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{ProductFilter, RegistrationFilter};
use crate::reports::{registrations_csv, summarize, ReportData, SummaryReport};
use crate::AppState;

const CSV_FILENAME: &str = "registrations.csv";

/// Report scope.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub season_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
}

/// GET /api/reports/registrations.csv - Spreadsheet export of registrations.
pub async fn export_registrations_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppErrorWithRevision> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let bytes = build_csv(&state, &query)
        .await
        .map_err(|error| AppErrorWithRevision { error, revision_id })?;

    tracing::info!("Exported registrations CSV ({} bytes)", bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/reports/summary - Totals and occupancy for a season (or everything).
pub async fn get_summary_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<SummaryReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let registrations = match state.repo.list_registrations(&registration_filter(&query)).await {
        Ok(registrations) => registrations,
        Err(e) => return error(e, revision_id),
    };

    let product_filter = ProductFilter {
        season_id: query.season_id.clone(),
        pool_id: None,
    };
    let mut products = match state.repo.list_products(&product_filter).await {
        Ok(products) => products,
        Err(e) => return error(e, revision_id),
    };
    if let Some(product_id) = &query.product_id {
        products.retain(|p| &p.id == product_id);
    }

    success(
        summarize(query.season_id, &registrations, &products),
        revision_id,
    )
}

async fn build_csv(state: &AppState, query: &ReportQuery) -> Result<Vec<u8>, AppError> {
    let registrations = state
        .repo
        .list_registrations(&registration_filter(query))
        .await?;
    let participants = state.repo.list_participants().await?;
    let products = state.repo.list_products(&ProductFilter::default()).await?;

    registrations_csv(&ReportData::new(&registrations, &participants, &products))
}

fn registration_filter(query: &ReportQuery) -> RegistrationFilter {
    RegistrationFilter {
        product_id: query.product_id.clone(),
        participant_id: None,
        season_id: query.season_id.clone(),
    }
}
