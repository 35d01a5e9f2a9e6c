//! Usage: Report listing and embedding endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use crate::domain::discovery::ReportCatalog;
use crate::domain::session::EmbedOutcome;
use crate::server::EmbedHostState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListReportsQuery {
    #[serde(default)]
    refresh: bool,
}

pub(crate) async fn list_reports(
    State(state): State<EmbedHostState>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<ReportCatalog>, ApiError> {
    let catalog = state.session.load_reports(query.refresh).await?;
    Ok(Json(catalog))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbedRequest {
    report_id: Option<String>,
}

pub(crate) async fn embed_report(
    State(state): State<EmbedHostState>,
    body: Option<Json<EmbedRequest>>,
) -> Result<Json<EmbedOutcome>, ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let outcome = state.session.embed_report(request.report_id.as_deref()).await?;
    Ok(Json(outcome))
}
