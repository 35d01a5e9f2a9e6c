//! Usage: Host-level endpoints (health, browser config script).

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::ApiError;
use crate::server::EmbedHostState;
use crate::shared::error::AppError;

pub(crate) const HEALTH_MESSAGE: &str = "Power BI Embedded (Org owns data) demo server is running.";

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    ok: bool,
    message: &'static str,
    version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        message: HEALTH_MESSAGE,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `window.__POWER_BI_EMBED_CONFIG = {...};` served with `Cache-Control: no-store`.
pub(crate) async fn app_config_script(
    State(state): State<EmbedHostState>,
) -> Result<impl IntoResponse, ApiError> {
    let script = state
        .settings
        .client_config_script()
        .map_err(AppError::from)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        script,
    ))
}
