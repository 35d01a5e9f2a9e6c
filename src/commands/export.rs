//! Usage: Export-to-PDF endpoint (returns the file as an attachment).

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Response, StatusCode};

use super::ApiError;
use crate::server::EmbedHostState;
use crate::shared::error_code::ErrorCode;

pub(crate) async fn export_pdf(State(state): State<EmbedHostState>) -> Result<Response<Body>, ApiError> {
    let file = state.session.export_pdf().await?;

    // File names are already restricted to [A-Za-z0-9_-] plus ".pdf".
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.file_name))
        .map_err(|e| ErrorCode::SystemError.error(format!("invalid Content-Disposition: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(file.content))
        .map_err(|e| {
            ErrorCode::SystemError
                .error(format!("failed to build export response: {e}"))
                .into()
        })
}
