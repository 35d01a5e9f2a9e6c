#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Notify;

use pbi_org_embed_lib::auth::credential::Credential;
use pbi_org_embed_lib::auth::token_provider::TokenProvider;
use pbi_org_embed_lib::domain::export::PollPolicy;
use pbi_org_embed_lib::domain::session::{SessionConfig, SessionController};
use pbi_org_embed_lib::infra::powerbi_api::PowerBiApi;
use pbi_org_embed_lib::test_support::{self, ManualClock, ScriptedIdentityClient};

pub const API_PREFIX: &str = "/v1.0/myorg";
pub const WORKSPACE_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const REPORT_ID: &str = "22222222-2222-2222-2222-222222222222";

/// How the fake `ExportTo` endpoint answers.
#[derive(Debug, Clone)]
pub enum StartReply {
    BodyId(String),
    LocationOnly(String),
    Empty,
    Status(u16),
}

#[derive(Debug)]
pub struct MockState {
    pub my_reports: Vec<Value>,
    pub my_reports_status: Option<u16>,
    pub groups: Vec<Value>,
    pub groups_status: Option<u16>,
    pub group_reports: HashMap<String, Result<Vec<Value>, u16>>,
    pub start: StartReply,
    pub hold_start: Option<Arc<Notify>>,
    /// Status bodies served in order; the last one repeats.
    pub statuses: VecDeque<Value>,
    pub status_error: Option<u16>,
    pub file: Result<Vec<u8>, u16>,
    pub starts: usize,
    pub polls: usize,
    pub downloads: usize,
    pub export_paths: Vec<String>,
    pub export_bodies: Vec<Value>,
    pub authorization: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            my_reports: Vec::new(),
            my_reports_status: None,
            groups: Vec::new(),
            groups_status: None,
            group_reports: HashMap::new(),
            start: StartReply::BodyId("export-1".to_string()),
            hold_start: None,
            statuses: VecDeque::from([json!({ "status": "Succeeded", "percentComplete": 100 })]),
            status_error: None,
            file: Ok(b"%PDF-1.7 test".to_vec()),
            starts: 0,
            polls: 0,
            downloads: 0,
            export_paths: Vec::new(),
            export_bodies: Vec::new(),
            authorization: Vec::new(),
        }
    }
}

/// In-process stand-in for the reporting REST API, bound to an ephemeral loopback port.
#[derive(Clone, Default)]
pub struct MockPowerBi {
    state: Arc<Mutex<MockState>>,
}

impl MockPowerBi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("lock mock state")
    }

    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock addr");
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}{API_PREFIX}")
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("valid status")
}

fn error_reply(code: u16) -> Response {
    (
        status(code),
        axum::Json(json!({ "error": { "code": "MockFailure", "message": "mock failure" } })),
    )
        .into_response()
}

fn list_reply(items: &[Value]) -> Response {
    axum::Json(json!({ "value": items })).into_response()
}

async fn handle(
    State(mock): State<MockPowerBi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().strip_prefix(API_PREFIX).unwrap_or(uri.path()).to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        mock.state().authorization.push(auth.to_string());
    }

    match (method, segments.as_slice()) {
        (Method::GET, ["reports"]) => {
            let state = mock.state();
            match state.my_reports_status {
                Some(code) => error_reply(code),
                None => list_reply(&state.my_reports),
            }
        }
        (Method::GET, ["groups"]) => {
            let state = mock.state();
            match state.groups_status {
                Some(code) => error_reply(code),
                None => list_reply(&state.groups),
            }
        }
        (Method::GET, ["groups", group_id, "reports"]) => {
            let state = mock.state();
            match state.group_reports.get(*group_id) {
                Some(Ok(reports)) => list_reply(reports),
                Some(Err(code)) => error_reply(*code),
                None => list_reply(&[]),
            }
        }
        (Method::POST, [.., "ExportTo"]) => {
            let hold = {
                let mut state = mock.state();
                state.starts += 1;
                state.export_paths.push(path.clone());
                if let Ok(parsed) = serde_json::from_slice::<Value>(&body) {
                    state.export_bodies.push(parsed);
                }
                state.hold_start.clone()
            };
            if let Some(hold) = hold {
                hold.notified().await;
            }
            let reply = mock.state().start.clone();
            match reply {
                StartReply::BodyId(id) => (
                    StatusCode::ACCEPTED,
                    axum::Json(json!({ "id": id, "status": "NotStarted" })),
                )
                    .into_response(),
                StartReply::LocationOnly(id) => {
                    let report_path = path.trim_end_matches("ExportTo");
                    let location = format!("{API_PREFIX}{report_path}exports/{id}?api-version=1");
                    (StatusCode::ACCEPTED, [(header::LOCATION, location)]).into_response()
                }
                StartReply::Empty => StatusCode::ACCEPTED.into_response(),
                StartReply::Status(code) => error_reply(code),
            }
        }
        (Method::GET, [.., "exports", _export_id]) => {
            let mut state = mock.state();
            state.polls += 1;
            if let Some(code) = state.status_error {
                return error_reply(code);
            }
            let body = if state.statuses.len() > 1 {
                state.statuses.pop_front()
            } else {
                state.statuses.front().cloned()
            };
            axum::Json(body.unwrap_or_else(|| json!({}))).into_response()
        }
        (Method::GET, [.., "exports", _export_id, "file"]) => {
            let mut state = mock.state();
            state.downloads += 1;
            match &state.file {
                Ok(bytes) => (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    bytes.clone(),
                )
                    .into_response(),
                Err(code) => error_reply(*code),
            }
        }
        _ => error_reply(404),
    }
}

pub fn report(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "embedUrl": format!("https://app.powerbi.com/reportEmbed?reportId={id}"),
    })
}

pub fn group(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name })
}

pub fn running(percent: u8) -> Value {
    json!({ "status": "Running", "percentComplete": percent })
}

pub fn succeeded(report_name: &str) -> Value {
    json!({ "status": "Succeeded", "percentComplete": 100, "reportName": report_name })
}

pub fn api(base_url: &str) -> PowerBiApi {
    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("http client");
    PowerBiApi::new(client, base_url).expect("api")
}

pub fn token() -> Credential {
    test_support::credential_expiring_in(3600)
}

pub fn session_config(dynamic: bool) -> SessionConfig {
    SessionConfig {
        workspace_id: WORKSPACE_ID.to_string(),
        report_id: REPORT_ID.to_string(),
        use_dynamic_report_selection: dynamic,
        app_url: "https://app.powerbi.com".to_string(),
        poll_policy: PollPolicy::default(),
    }
}

pub fn scopes() -> Vec<String> {
    vec!["https://analysis.windows.net/powerbi/api/Report.Read.All".to_string()]
}

pub struct TestSession {
    pub session: Arc<SessionController>,
    pub identity: Arc<ScriptedIdentityClient>,
    pub clock: Arc<ManualClock>,
}

/// Session wired to `base_url` with a signed-in scripted identity and a manual clock.
pub fn signed_in_session(base_url: &str, config: SessionConfig) -> TestSession {
    let identity = Arc::new(
        ScriptedIdentityClient::signed_in(test_support::test_account("analyst@contoso.com"))
            .with_fallback_silent(token()),
    );
    session_with(base_url, config, identity)
}

pub fn session_with(
    base_url: &str,
    config: SessionConfig,
    identity: Arc<ScriptedIdentityClient>,
) -> TestSession {
    let clock = Arc::new(ManualClock::new());
    let tokens = TokenProvider::new(identity.clone(), scopes());
    let session = Arc::new(SessionController::new(
        config,
        tokens,
        api(base_url),
        clock.clone(),
    ));
    TestSession {
        session,
        identity,
        clock,
    }
}
