//! Usage: Centralized error-code enum for stable classification/mapping.

use super::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoActiveSession,
    SilentAcquisitionFailed,
    InteractiveAcquisitionFailed,
    ExportStartFailed,
    ExportIdMissing,
    ExportStatusFailed,
    ExportJobFailed,
    ExportTimedOut,
    ExportDownloadFailed,
    ExportInProgress,
    ExportNoReportContext,
    EmbedInProgress,
    SessionChanged,
    DiscoveryFetchFailed,
    InvalidInput,
    SystemError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveSession => "AUTH_NO_ACTIVE_SESSION",
            Self::SilentAcquisitionFailed => "AUTH_SILENT_FAILED",
            Self::InteractiveAcquisitionFailed => "AUTH_INTERACTIVE_FAILED",
            Self::ExportStartFailed => "EXPORT_START_FAILED",
            Self::ExportIdMissing => "EXPORT_ID_MISSING",
            Self::ExportStatusFailed => "EXPORT_STATUS_FAILED",
            Self::ExportJobFailed => "EXPORT_JOB_FAILED",
            Self::ExportTimedOut => "EXPORT_TIMED_OUT",
            Self::ExportDownloadFailed => "EXPORT_DOWNLOAD_FAILED",
            Self::ExportInProgress => "EXPORT_IN_PROGRESS",
            Self::ExportNoReportContext => "EXPORT_NO_REPORT_CONTEXT",
            Self::EmbedInProgress => "EMBED_IN_PROGRESS",
            Self::SessionChanged => "SESSION_CHANGED",
            Self::DiscoveryFetchFailed => "DISCOVERY_FETCH_FAILED",
            Self::InvalidInput => "SEC_INVALID_INPUT",
            Self::SystemError => "SYSTEM_ERROR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "AUTH_NO_ACTIVE_SESSION" => Self::NoActiveSession,
            "AUTH_SILENT_FAILED" => Self::SilentAcquisitionFailed,
            "AUTH_INTERACTIVE_FAILED" => Self::InteractiveAcquisitionFailed,
            "EXPORT_START_FAILED" => Self::ExportStartFailed,
            "EXPORT_ID_MISSING" => Self::ExportIdMissing,
            "EXPORT_STATUS_FAILED" => Self::ExportStatusFailed,
            "EXPORT_JOB_FAILED" => Self::ExportJobFailed,
            "EXPORT_TIMED_OUT" => Self::ExportTimedOut,
            "EXPORT_DOWNLOAD_FAILED" => Self::ExportDownloadFailed,
            "EXPORT_IN_PROGRESS" => Self::ExportInProgress,
            "EXPORT_NO_REPORT_CONTEXT" => Self::ExportNoReportContext,
            "EMBED_IN_PROGRESS" => Self::EmbedInProgress,
            "SESSION_CHANGED" => Self::SessionChanged,
            "DISCOVERY_FETCH_FAILED" => Self::DiscoveryFetchFailed,
            "SEC_INVALID_INPUT" => Self::InvalidInput,
            "SYSTEM_ERROR" => Self::SystemError,
            _ => return None,
        })
    }

    pub fn error(self, message: impl Into<String>) -> AppError {
        AppError::new(self.as_str(), message)
    }
}
