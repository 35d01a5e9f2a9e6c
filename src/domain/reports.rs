//! Usage: Report descriptors shown to the user and the embedded-report context.

use std::cmp::Ordering;

use serde::Serialize;

use crate::infra::powerbi_api::ApiReport;

pub const MY_WORKSPACE_NAME: &str = "My Workspace";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDescriptor {
    pub id: String,
    pub name: String,
    /// `None` is the caller's personal workspace.
    pub workspace_id: Option<String>,
    pub workspace_name: String,
    pub embed_url: String,
}

impl ReportDescriptor {
    pub fn from_api(report: ApiReport, workspace_id: Option<&str>, workspace_name: &str) -> Self {
        Self {
            id: report.id,
            name: report.name,
            workspace_id: workspace_id.map(str::to_string),
            workspace_name: workspace_name.to_string(),
            embed_url: report.embed_url,
        }
    }

    /// `"{workspace} - {report}"`, as listed in the report selector.
    pub fn label(&self) -> String {
        format!("{} - {}", self.workspace_name, self.name)
    }
}

/// Ordinal (case-sensitive) ascending by workspace name, then report name.
///
/// Ordinal means UTF-16 code units, the order the browser's report selector uses; it differs
/// from byte order once names mix U+E000..U+FFFF with characters outside the BMP.
pub fn sort_reports(reports: &mut [ReportDescriptor]) {
    reports.sort_by(|a, b| {
        ordinal_cmp(&a.workspace_name, &b.workspace_name)
            .then_with(|| ordinal_cmp(&a.name, &b.name))
    });
}

fn ordinal_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// The report currently embedded; exports always target it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub report_id: String,
    pub workspace_id: Option<String>,
}

impl ReportContext {
    pub fn new(report_id: impl Into<String>, workspace_id: Option<String>) -> Self {
        Self {
            report_id: report_id.into(),
            workspace_id: workspace_id.filter(|id| !id.trim().is_empty()),
        }
    }
}
