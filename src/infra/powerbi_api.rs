//! Usage: Thin Power BI REST client (URL building, bearer requests, OData list payloads).

use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::credential::Credential;
use crate::shared::error::{AppError, AppResult};
use crate::shared::error_code::ErrorCode;
use crate::shared::security::error_body_snippet;

const USER_AGENT_PREFIX: &str = "pbi-org-embed";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `{"value": [...]}` envelope used by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ODataList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub embed_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A successful response already read into memory.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
}

impl ApiResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn build_http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("{USER_AGENT_PREFIX}/{}", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| format!("SYSTEM_ERROR: http client init failed: {e}").into())
}

#[derive(Debug, Clone)]
pub struct PowerBiApi {
    client: reqwest::Client,
    base_url: Url,
}

impl PowerBiApi {
    pub fn new(client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .map_err(|e| format!("SEC_INVALID_INPUT: invalid reporting API url {trimmed:?}: {e}"))?;
        if base_url.cannot_be_a_base() {
            return Err(ErrorCode::InvalidInput.error(format!(
                "reporting API url cannot be a base: {trimmed}"
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments, percent-encoding each one.
    fn url_with<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // `cannot_be_a_base` is rejected in `new`, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn reports_url(&self) -> Url {
        self.url_with(["reports"])
    }

    pub fn groups_url(&self) -> Url {
        self.url_with(["groups"])
    }

    pub fn group_reports_url(&self, group_id: &str) -> Url {
        self.url_with(["groups", group_id, "reports"])
    }

    /// `{base}/groups/{workspace}/reports/{report}` or `{base}/reports/{report}` for My Workspace.
    pub fn report_api_base(&self, report_id: &str, workspace_id: Option<&str>) -> Url {
        match workspace_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(workspace_id) => self.url_with(["groups", workspace_id, "reports", report_id]),
            None => self.url_with(["reports", report_id]),
        }
    }

    pub fn export_to_url(&self, report_id: &str, workspace_id: Option<&str>) -> Url {
        extend(self.report_api_base(report_id, workspace_id), ["ExportTo"])
    }

    pub fn export_status_url(&self, report_id: &str, workspace_id: Option<&str>, export_id: &str) -> Url {
        extend(
            self.report_api_base(report_id, workspace_id),
            ["exports", export_id],
        )
    }

    pub fn export_file_url(&self, report_id: &str, workspace_id: Option<&str>, export_id: &str) -> Url {
        extend(
            self.report_api_base(report_id, workspace_id),
            ["exports", export_id, "file"],
        )
    }

    pub async fn get(&self, token: &Credential, url: Url, code: ErrorCode, what: &str) -> AppResult<ApiResponse> {
        let request = self.client.get(url).header(
            reqwest::header::AUTHORIZATION,
            token.bearer_header(),
        );
        send(request, code, what).await
    }

    pub async fn post_json(
        &self,
        token: &Credential,
        url: Url,
        body: &serde_json::Value,
        code: ErrorCode,
        what: &str,
    ) -> AppResult<ApiResponse> {
        let request = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, token.bearer_header())
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        send(request, code, what).await
    }

    /// GET an OData list; a body without `value` is an empty list.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        token: &Credential,
        url: Url,
        code: ErrorCode,
        what: &str,
    ) -> AppResult<Vec<T>> {
        let response = self.get(token, url, code, what).await?;
        if response.body.is_empty() {
            return Ok(Vec::new());
        }
        let list: ODataList<T> = serde_json::from_slice(&response.body)
            .map_err(|e| code.error(format!("{what}: invalid JSON payload: {e}")))?;
        Ok(list.value)
    }
}

fn extend<'a>(mut url: Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    if let Ok(mut path) = url.path_segments_mut() {
        path.extend(segments);
    }
    url
}

/// Non-2xx becomes `code` with `"{what} ({status}): {details}"`.
async fn send(request: RequestBuilder, code: ErrorCode, what: &str) -> AppResult<ApiResponse> {
    let response: Response = request
        .send()
        .await
        .map_err(|e| code.error(format!("{what}: request failed: {e}")))?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| code.error(format!("{what} ({}): body read failed: {e}", status.as_u16())))?;

    if !status.is_success() {
        let details = error_body_snippet(&String::from_utf8_lossy(&body));
        return Err(upstream_error(code, what, status, &details));
    }

    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

fn upstream_error(code: ErrorCode, what: &str, status: StatusCode, details: &str) -> AppError {
    code.error(format!("{what} ({}): {details}", status.as_u16()))
}
