//! Usage: Export-to-PDF workflow against the long-running export API (start, poll, download).

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use crate::auth::credential::Credential;
use crate::domain::export::job::{extract_export_id, ExportJob, ExportStatus, EXPORT_FORMAT};
use crate::domain::export::state::ExportEvent;
use crate::domain::reports::ReportContext;
use crate::infra::powerbi_api::PowerBiApi;
use crate::shared::error::AppResult;
use crate::shared::error_code::ErrorCode;
use crate::shared::time::Clock;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

pub async fn start_export(
    api: &PowerBiApi,
    token: &Credential,
    report_id: &str,
    workspace_id: Option<&str>,
) -> AppResult<ExportJob> {
    let url = api.export_to_url(report_id, workspace_id);
    let response = api
        .post_json(
            token,
            url,
            &json!({ "format": EXPORT_FORMAT }),
            ErrorCode::ExportStartFailed,
            "Export start failed",
        )
        .await?;

    let export_id = extract_export_id(&response.text(), response.header_str("location"))?;
    tracing::info!(report_id, export_id = %export_id, "export job started");
    Ok(ExportJob::new(
        export_id,
        report_id,
        workspace_id.map(str::to_string),
    ))
}

/// One status request; returns the job with status, progress and report name refreshed.
pub async fn poll_export_status(api: &PowerBiApi, token: &Credential, job: &ExportJob) -> AppResult<ExportJob> {
    let url = api.export_status_url(&job.report_id, job.workspace_id.as_deref(), &job.id);
    let response = api
        .get(token, url, ErrorCode::ExportStatusFailed, "Export status failed")
        .await?;

    let mut next = job.clone();
    next.apply_status_body(&response.text());
    tracing::debug!(
        export_id = %next.id,
        status = ?next.status,
        percent_complete = next.percent_complete,
        "export status polled"
    );
    Ok(next)
}

/// Poll until the job succeeds or fails, or until more than `policy.timeout` has elapsed.
///
/// The timeout is checked before every poll, so a job is always polled at least once.
/// `on_progress` sees each non-terminal observation.
pub async fn wait_for_export<F>(
    api: &PowerBiApi,
    token: &Credential,
    job: ExportJob,
    clock: &dyn Clock,
    policy: PollPolicy,
    mut on_progress: F,
) -> AppResult<ExportJob>
where
    F: FnMut(&ExportJob) + Send,
{
    let started = clock.elapsed();
    let mut job = job;
    loop {
        if clock.elapsed().saturating_sub(started) > policy.timeout {
            tracing::warn!(
                export_id = %job.id,
                timeout_secs = policy.timeout.as_secs(),
                "export timed out"
            );
            return Err(ErrorCode::ExportTimedOut.error("Export timed out."));
        }

        job = poll_export_status(api, token, &job).await?;
        match job.status {
            ExportStatus::Succeeded => return Ok(job),
            ExportStatus::Failed => {
                let message = job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Export job failed.".to_string());
                return Err(ErrorCode::ExportJobFailed.error(message));
            }
            ExportStatus::Pending | ExportStatus::Running => {
                on_progress(&job);
                clock.sleep(policy.interval).await;
            }
        }
    }
}

/// Fetch the rendered file; only valid once a poll observed `Succeeded`.
pub async fn download_export_file(api: &PowerBiApi, token: &Credential, job: &ExportJob) -> AppResult<ExportedFile> {
    if job.status != ExportStatus::Succeeded {
        return Err(ErrorCode::ExportDownloadFailed.error(format!(
            "export {} has not succeeded (status={:?})",
            job.id, job.status
        )));
    }

    let url = api.export_file_url(&job.report_id, job.workspace_id.as_deref(), &job.id);
    let response = api
        .get(token, url, ErrorCode::ExportDownloadFailed, "Export download failed")
        .await?;
    let content_type = response
        .header_str("content-type")
        .unwrap_or("application/pdf")
        .to_string();

    let file = ExportedFile {
        file_name: job.file_name(),
        content_type,
        content: response.body,
    };
    tracing::info!(
        export_id = %job.id,
        file_name = %file.file_name,
        bytes = file.content.len(),
        "export file downloaded"
    );
    Ok(file)
}

/// Start, poll and download for the embedded report, reporting each step as an `ExportEvent`.
///
/// A failure is reported once through `on_event` and then returned.
pub async fn export_report<F>(
    api: &PowerBiApi,
    token: &Credential,
    context: &ReportContext,
    clock: &dyn Clock,
    policy: PollPolicy,
    mut on_event: F,
) -> AppResult<ExportedFile>
where
    F: FnMut(ExportEvent) + Send,
{
    let result = async {
        let job = start_export(api, token, &context.report_id, context.workspace_id.as_deref()).await?;
        on_event(ExportEvent::Started {
            export_id: job.id.clone(),
        });
        let job = wait_for_export(api, token, job, clock, policy, |job| {
            on_event(ExportEvent::Progress {
                percent_complete: job.percent_complete,
            })
        })
        .await?;
        download_export_file(api, token, &job).await
    }
    .await;

    match result {
        Ok(file) => {
            on_event(ExportEvent::Completed {
                file_name: file.file_name.clone(),
            });
            Ok(file)
        }
        Err(err) => {
            tracing::warn!(report_id = %context.report_id, "export to PDF failed: {}", err);
            on_event(ExportEvent::from_error(&err));
            Err(err)
        }
    }
}
