//! Usage: Export job model, status payload parsing, job id extraction and PDF file naming.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::error::AppResult;
use crate::shared::error_code::ErrorCode;

pub const FALLBACK_FILE_STEM: &str = "powerbi-report";
pub const EXPORT_FORMAT: &str = "PDF";
const DEFAULT_JOB_FAILED_MESSAGE: &str = "Export job failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ExportStatus {
    /// Maps the service's `status` string; `NotStarted`, `Undefined` and unknown values are pending.
    pub fn from_api(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub id: String,
    pub report_id: String,
    pub workspace_id: Option<String>,
    pub status: ExportStatus,
    pub percent_complete: u8,
    pub report_name: Option<String>,
    pub error_message: Option<String>,
}

impl ExportJob {
    pub fn new(id: impl Into<String>, report_id: impl Into<String>, workspace_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            report_id: report_id.into(),
            workspace_id,
            status: ExportStatus::Pending,
            percent_complete: 0,
            report_name: None,
            error_message: None,
        }
    }

    /// Fold one status response into the job. An unparseable body leaves the status pending.
    pub fn apply_status_body(&mut self, body: &str) {
        let payload: StatusPayload = if body.trim().is_empty() {
            StatusPayload::default()
        } else {
            serde_json::from_str(body).unwrap_or_default()
        };

        self.status = ExportStatus::from_api(payload.status.as_deref());
        self.percent_complete = payload
            .percent_complete
            .as_ref()
            .and_then(Value::as_f64)
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0);
        if let Some(name) = payload.report_name.filter(|n| !n.trim().is_empty()) {
            self.report_name = Some(name);
        }
        if self.status == ExportStatus::Failed {
            self.error_message = Some(
                payload
                    .error
                    .and_then(|e| e.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_JOB_FAILED_MESSAGE.to_string()),
            );
        }
    }

    pub fn file_name(&self) -> String {
        pdf_file_name(self.report_name.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    status: Option<String>,
    percent_complete: Option<Value>,
    report_name: Option<String>,
    error: Option<StatusError>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusError {
    message: Option<String>,
}

/// Export id from the start response: body `id` first, else the last non-empty `Location` segment.
pub fn extract_export_id(body: &str, location: Option<&str>) -> AppResult<String> {
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .filter(|id| !id.trim().is_empty());
    if let Some(id) = from_body {
        return Ok(id);
    }

    location
        .map(|loc| loc.split(&['?', '#'][..]).next().unwrap_or(loc))
        .and_then(|loc| loc.split('/').filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| ErrorCode::ExportIdMissing.error("Export job ID missing from response."))
}

fn unsafe_run() -> Option<&'static Regex> {
    static UNSAFE_RUN: OnceLock<Option<Regex>> = OnceLock::new();
    // Hyphens are folded into the run so repeated hyphens collapse too.
    UNSAFE_RUN
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").ok())
        .as_ref()
}

/// File stem made of `[A-Za-z0-9_-]`, without leading, trailing or repeated hyphens.
pub fn sanitize_file_name(name: &str) -> String {
    let Some(re) = unsafe_run() else {
        return FALLBACK_FILE_STEM.to_string();
    };
    let cleaned = re.replace_all(name, "-");
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn pdf_file_name(report_name: Option<&str>) -> String {
    let stem = report_name
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_FILE_STEM);
    format!("{}.pdf", sanitize_file_name(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_unsafe_runs() {
        assert_eq!(sanitize_file_name("My Report! (v2)"), "My-Report-v2");
        assert_eq!(sanitize_file_name("--a---b__c--"), "a-b__c");
        assert_eq!(sanitize_file_name("Umsatz über 2024"), "Umsatz-ber-2024");
        assert_eq!(sanitize_file_name("!!!"), FALLBACK_FILE_STEM);
    }

    #[test]
    fn sanitized_names_only_use_the_safe_charset() {
        for input in ["a/b\\c", " spaced  out ", "tab\tname", "ü-ö-ä", "x.y.z"] {
            let out = sanitize_file_name(input);
            assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            assert!(!out.starts_with('-') && !out.ends_with('-') && !out.contains("--"));
        }
    }

    #[test]
    fn pdf_file_name_falls_back_when_name_missing() {
        assert_eq!(pdf_file_name(None), "powerbi-report.pdf");
        assert_eq!(pdf_file_name(Some("")), "powerbi-report.pdf");
        assert_eq!(pdf_file_name(Some("Q3 Sales")), "Q3-Sales.pdf");
    }

    #[test]
    fn export_id_prefers_body() {
        let id = extract_export_id(
            r#"{"id":"from-body"}"#,
            Some("https://api/reports/r/exports/from-location"),
        )
        .expect("id");
        assert_eq!(id, "from-body");
    }

    #[test]
    fn export_id_accepts_numeric_body_id() {
        let id = extract_export_id(r#"{"id":4711}"#, None).expect("id");
        assert_eq!(id, "4711");
        let id = extract_export_id(r#"{"id":true}"#, Some("/exports/loc")).expect("id");
        assert_eq!(id, "loc");
    }

    #[test]
    fn export_id_falls_back_to_location() {
        let id = extract_export_id("", Some("https://api/reports/r/exports/abc123/"))
            .expect("id");
        assert_eq!(id, "abc123");
        let id = extract_export_id("not json", Some("/exports/xyz?api-version=1")).expect("id");
        assert_eq!(id, "xyz");
    }

    #[test]
    fn export_id_missing_everywhere_is_an_error() {
        let err = extract_export_id("{}", None).expect_err("missing");
        assert!(err.is(ErrorCode::ExportIdMissing));
        let err = extract_export_id("", Some("///")).expect_err("missing");
        assert!(err.is(ErrorCode::ExportIdMissing));
    }

    #[test]
    fn status_body_updates_job() {
        let mut job = ExportJob::new("e1", "r1", None);
        job.apply_status_body(r#"{"status":"Running","percentComplete":42,"reportName":"Sales"}"#);
        assert_eq!(job.status, ExportStatus::Running);
        assert_eq!(job.percent_complete, 42);
        assert_eq!(job.file_name(), "Sales.pdf");

        job.apply_status_body(r#"{"status":"NotStarted","percentComplete":"n/a"}"#);
        assert_eq!(job.status, ExportStatus::Pending);
        assert_eq!(job.percent_complete, 0);
        assert_eq!(job.report_name.as_deref(), Some("Sales"));
    }

    #[test]
    fn failed_status_carries_message_or_default() {
        let mut job = ExportJob::new("e1", "r1", None);
        job.apply_status_body(r#"{"status":"Failed","error":{"message":"Visual not supported"}}"#);
        assert_eq!(job.status, ExportStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Visual not supported"));

        let mut job = ExportJob::new("e2", "r1", None);
        job.apply_status_body(r#"{"status":"Failed"}"#);
        assert_eq!(job.error_message.as_deref(), Some("Export job failed."));
    }

    #[test]
    fn garbage_status_body_is_pending() {
        let mut job = ExportJob::new("e1", "r1", None);
        job.apply_status_body("<html>");
        assert_eq!(job.status, ExportStatus::Pending);
    }
}
