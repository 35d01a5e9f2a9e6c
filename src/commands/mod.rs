//! Usage: HTTP API handlers exposed by the embed host (thin wrappers over the session controller).

pub(crate) mod app;
pub(crate) mod export;
pub(crate) mod reports;
pub(crate) mod session;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::export::ExportPhase;
use crate::shared::error::AppError;
use crate::shared::error_code::ErrorCode;

/// `AppError` rendered as `{code, message[, phase]}` with a status derived from the code.
#[derive(Debug)]
pub(crate) struct ApiError(pub(crate) AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<ExportPhase>,
}

pub(crate) fn status_for(err: &AppError) -> StatusCode {
    let Some(code) = ErrorCode::from_str(err.code()) else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    match code {
        ErrorCode::NoActiveSession
        | ErrorCode::SilentAcquisitionFailed
        | ErrorCode::InteractiveAcquisitionFailed => StatusCode::UNAUTHORIZED,
        ErrorCode::ExportInProgress
        | ErrorCode::ExportNoReportContext
        | ErrorCode::EmbedInProgress
        | ErrorCode::SessionChanged => StatusCode::CONFLICT,
        ErrorCode::ExportTimedOut => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::ExportStartFailed
        | ErrorCode::ExportIdMissing
        | ErrorCode::ExportStatusFailed
        | ErrorCode::ExportJobFailed
        | ErrorCode::ExportDownloadFailed
        | ErrorCode::DiscoveryFetchFailed => StatusCode::BAD_GATEWAY,
        ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCode::SystemError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), "api request failed: {}", self.0);
        } else {
            tracing::warn!(code = self.0.code(), "api request rejected: {}", self.0);
        }
        let body = ApiErrorBody {
            code: self.0.code(),
            message: self.0.message(),
            phase: ExportPhase::of_error(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_groups_codes() {
        let cases = [
            (ErrorCode::NoActiveSession, StatusCode::UNAUTHORIZED),
            (ErrorCode::InteractiveAcquisitionFailed, StatusCode::UNAUTHORIZED),
            (ErrorCode::ExportInProgress, StatusCode::CONFLICT),
            (ErrorCode::ExportNoReportContext, StatusCode::CONFLICT),
            (ErrorCode::EmbedInProgress, StatusCode::CONFLICT),
            (ErrorCode::SessionChanged, StatusCode::CONFLICT),
            (ErrorCode::ExportTimedOut, StatusCode::GATEWAY_TIMEOUT),
            (ErrorCode::ExportDownloadFailed, StatusCode::BAD_GATEWAY),
            (ErrorCode::InvalidInput, StatusCode::BAD_REQUEST),
            (ErrorCode::SystemError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(status_for(&code.error("x")), status, "{}", code.as_str());
        }
        assert_eq!(
            status_for(&AppError::new("SOMETHING_ELSE", "x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
