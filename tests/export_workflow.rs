mod support;

use std::sync::{Arc, Mutex};

use serde_json::json;

use pbi_org_embed_lib::domain::export::{
    download_export_file, export_report, start_export, wait_for_export, ExportEvent, ExportPhase,
    ExportStatus, PollPolicy,
};
use pbi_org_embed_lib::domain::reports::ReportContext;
use pbi_org_embed_lib::test_support::ManualClock;

#[tokio::test]
async fn succeeded_on_first_poll_downloads_without_further_polls() {
    let mock = support::MockPowerBi::new();
    mock.state().statuses = [support::succeeded("Sales Q1")].into();
    let base = mock.serve().await;
    let api = support::api(&base);
    let token = support::token();
    let clock = ManualClock::new();

    let job = start_export(&api, &token, support::REPORT_ID, Some(support::WORKSPACE_ID))
        .await
        .expect("start");
    assert_eq!(job.id, "export-1");

    let mut progress = Vec::new();
    let job = wait_for_export(&api, &token, job, &clock, PollPolicy::default(), |job| {
        progress.push(job.percent_complete)
    })
    .await
    .expect("wait");
    assert_eq!(job.status, ExportStatus::Succeeded);
    assert!(progress.is_empty());

    let file = download_export_file(&api, &token, &job).await.expect("download");
    assert_eq!(file.file_name, "Sales-Q1.pdf");
    assert_eq!(file.content_type, "application/pdf");
    assert_eq!(&file.content[..], b"%PDF-1.7 test");

    let state = mock.state();
    assert_eq!(state.polls, 1);
    assert_eq!(state.downloads, 1);
    assert_eq!(clock.sleep_count(), 0);
    assert_eq!(
        state.export_paths,
        vec![format!(
            "/groups/{}/reports/{}/ExportTo",
            support::WORKSPACE_ID,
            support::REPORT_ID
        )]
    );
    assert_eq!(state.export_bodies, vec![json!({ "format": "PDF" })]);
}

#[tokio::test]
async fn progress_is_reported_until_success() {
    let mock = support::MockPowerBi::new();
    mock.state().statuses = [
        json!({ "status": "NotStarted" }),
        support::running(40),
        support::running(80),
        support::succeeded("Ops"),
    ]
    .into();
    let base = mock.serve().await;
    let api = support::api(&base);
    let clock = ManualClock::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let context = ReportContext::new(support::REPORT_ID, Some(support::WORKSPACE_ID.to_string()));
    let file = export_report(
        &api,
        &support::token(),
        &context,
        &clock,
        PollPolicy::default(),
        move |event| sink.lock().expect("events").push(event),
    )
    .await
    .expect("export");

    assert_eq!(file.file_name, "Ops.pdf");
    assert_eq!(mock.state().polls, 4);
    assert_eq!(clock.sleep_count(), 3);
    let events = events.lock().expect("events").clone();
    assert_eq!(
        events,
        vec![
            ExportEvent::Started {
                export_id: "export-1".to_string()
            },
            ExportEvent::Progress { percent_complete: 0 },
            ExportEvent::Progress { percent_complete: 40 },
            ExportEvent::Progress { percent_complete: 80 },
            ExportEvent::Completed {
                file_name: "Ops.pdf".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn export_times_out_after_the_poll_budget() {
    let mock = support::MockPowerBi::new();
    mock.state().statuses = [support::running(50)].into();
    let base = mock.serve().await;
    let api = support::api(&base);
    let token = support::token();
    let clock = ManualClock::new();

    let job = start_export(&api, &token, support::REPORT_ID, None)
        .await
        .expect("start");
    let err = wait_for_export(&api, &token, job, &clock, PollPolicy::default(), |_| {})
        .await
        .expect_err("timeout");

    assert_eq!(err.code(), "EXPORT_TIMED_OUT");
    assert_eq!(err.message(), "Export timed out.");
    // 2 s interval, 180 s budget: polls at t=0,2,...,180.
    assert_eq!(mock.state().polls, 91);
    assert_eq!(clock.sleep_count(), 91);
    assert_eq!(mock.state().downloads, 0);
}

#[tokio::test]
async fn export_id_falls_back_to_location_header() {
    let mock = support::MockPowerBi::new();
    mock.state().start = support::StartReply::LocationOnly("exp-from-location".to_string());
    let base = mock.serve().await;
    let api = support::api(&base);

    let job = start_export(&api, &support::token(), support::REPORT_ID, None)
        .await
        .expect("start");

    assert_eq!(job.id, "exp-from-location");
    assert_eq!(job.workspace_id, None);
    assert_eq!(
        mock.state().export_paths,
        vec![format!("/reports/{}/ExportTo", support::REPORT_ID)]
    );
}

#[tokio::test]
async fn missing_export_id_is_a_start_failure() {
    let mock = support::MockPowerBi::new();
    mock.state().start = support::StartReply::Empty;
    let base = mock.serve().await;
    let api = support::api(&base);

    let err = start_export(&api, &support::token(), support::REPORT_ID, None)
        .await
        .expect_err("no id");

    assert_eq!(err.code(), "EXPORT_ID_MISSING");
    assert_eq!(err.message(), "Export job ID missing from response.");
    assert_eq!(ExportPhase::of_error(&err), Some(ExportPhase::Start));
}

#[tokio::test]
async fn rejected_start_reports_status_and_start_phase() {
    let mock = support::MockPowerBi::new();
    mock.state().start = support::StartReply::Status(403);
    let base = mock.serve().await;
    let api = support::api(&base);
    let clock = ManualClock::new();
    let mut events = Vec::new();

    let context = ReportContext::new(support::REPORT_ID, None);
    let err = export_report(
        &api,
        &support::token(),
        &context,
        &clock,
        PollPolicy::default(),
        |event| events.push(event),
    )
    .await
    .expect_err("start rejected");

    assert_eq!(err.code(), "EXPORT_START_FAILED");
    assert!(err.message().starts_with("Export start failed (403)"), "{}", err.message());
    assert!(matches!(
        events.as_slice(),
        [ExportEvent::Failed {
            phase: Some(ExportPhase::Start),
            ..
        }]
    ));
    assert_eq!(mock.state().polls, 0);
}

#[tokio::test]
async fn status_request_failure_stops_polling() {
    let mock = support::MockPowerBi::new();
    mock.state().status_error = Some(500);
    let base = mock.serve().await;
    let api = support::api(&base);
    let token = support::token();
    let clock = ManualClock::new();

    let job = start_export(&api, &token, support::REPORT_ID, None)
        .await
        .expect("start");
    let err = wait_for_export(&api, &token, job, &clock, PollPolicy::default(), |_| {})
        .await
        .expect_err("status failed");

    assert_eq!(err.code(), "EXPORT_STATUS_FAILED");
    assert!(err.message().contains("(500)"), "{}", err.message());
    assert_eq!(ExportPhase::of_error(&err), Some(ExportPhase::Poll));
    assert_eq!(mock.state().polls, 1);
}

#[tokio::test]
async fn failed_job_surfaces_service_message() {
    let mock = support::MockPowerBi::new();
    mock.state().statuses = [
        support::running(10),
        json!({ "status": "Failed", "error": { "code": "RenderFailed", "message": "Visual could not render" } }),
    ]
    .into();
    let base = mock.serve().await;
    let api = support::api(&base);
    let token = support::token();
    let clock = ManualClock::new();

    let job = start_export(&api, &token, support::REPORT_ID, None)
        .await
        .expect("start");
    let err = wait_for_export(&api, &token, job, &clock, PollPolicy::default(), |_| {})
        .await
        .expect_err("job failed");

    assert_eq!(err.code(), "EXPORT_JOB_FAILED");
    assert_eq!(err.message(), "Visual could not render");
    assert_eq!(mock.state().downloads, 0);
}

#[tokio::test]
async fn failed_job_without_message_uses_default() {
    let mock = support::MockPowerBi::new();
    mock.state().statuses = [json!({ "status": "Failed" })].into();
    let base = mock.serve().await;
    let api = support::api(&base);
    let token = support::token();
    let clock = ManualClock::new();

    let job = start_export(&api, &token, support::REPORT_ID, None)
        .await
        .expect("start");
    let err = wait_for_export(&api, &token, job, &clock, PollPolicy::default(), |_| {})
        .await
        .expect_err("job failed");

    assert_eq!(err.message(), "Export job failed.");
}

#[tokio::test]
async fn download_failure_is_reported_in_download_phase() {
    let mock = support::MockPowerBi::new();
    mock.state().file = Err(404);
    let base = mock.serve().await;
    let api = support::api(&base);
    let clock = ManualClock::new();
    let mut events = Vec::new();

    let context = ReportContext::new(support::REPORT_ID, None);
    let err = export_report(
        &api,
        &support::token(),
        &context,
        &clock,
        PollPolicy::default(),
        |event| events.push(event),
    )
    .await
    .expect_err("download failed");

    assert_eq!(err.code(), "EXPORT_DOWNLOAD_FAILED");
    assert!(matches!(
        events.last(),
        Some(ExportEvent::Failed {
            phase: Some(ExportPhase::Download),
            ..
        })
    ));
}
