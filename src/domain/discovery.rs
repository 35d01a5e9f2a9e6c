//! Usage: Report discovery across My Workspace and every accessible group workspace.
//!
//! One fan-out batch per call: group report lists are fetched concurrently and merged only
//! after every call has resolved. Failures are scoped to their source and never abort the rest.

use futures::future::join_all;
use serde::Serialize;

use crate::auth::credential::Credential;
use crate::domain::reports::{sort_reports, ReportDescriptor, MY_WORKSPACE_NAME};
use crate::infra::powerbi_api::{ApiGroup, ApiReport, PowerBiApi};
use crate::shared::error::AppResult;
use crate::shared::error_code::ErrorCode;

/// A source (personal workspace, group list, or one group) that contributed nothing because it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedSource {
    pub workspace_id: Option<String>,
    pub workspace_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCatalog {
    pub reports: Vec<ReportDescriptor>,
    pub degraded_sources: Vec<DegradedSource>,
}

const GROUP_LIST_SOURCE: &str = "Workspaces";

pub async fn discover_reports(api: &PowerBiApi, token: &Credential) -> ReportCatalog {
    let mut catalog = ReportCatalog::default();

    match fetch_personal_reports(api, token).await {
        Ok(reports) => catalog.reports.extend(reports),
        Err(err) => {
            tracing::warn!(workspace = MY_WORKSPACE_NAME, "report discovery failed: {}", err);
            catalog.degraded_sources.push(DegradedSource {
                workspace_id: None,
                workspace_name: MY_WORKSPACE_NAME.to_string(),
                message: err.to_string(),
            });
        }
    }

    let groups: Vec<ApiGroup> = match api
        .get_list(token, api.groups_url(), ErrorCode::DiscoveryFetchFailed, "List workspaces failed")
        .await
    {
        Ok(groups) => groups,
        Err(err) => {
            tracing::warn!("workspace listing failed, only My Workspace reports are available: {}", err);
            catalog.degraded_sources.push(DegradedSource {
                workspace_id: None,
                workspace_name: GROUP_LIST_SOURCE.to_string(),
                message: err.to_string(),
            });
            Vec::new()
        }
    };

    let fetches = groups.iter().map(|group| async move {
        let result = fetch_group_reports(api, token, group).await;
        (group, result)
    });
    for (group, result) in join_all(fetches).await {
        match result {
            Ok(reports) => catalog.reports.extend(reports),
            Err(err) => {
                tracing::warn!(
                    workspace_id = %group.id,
                    workspace = %group.name,
                    "report discovery failed for workspace: {}",
                    err
                );
                catalog.degraded_sources.push(DegradedSource {
                    workspace_id: Some(group.id.clone()),
                    workspace_name: group.name.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    sort_reports(&mut catalog.reports);
    tracing::info!(
        reports = catalog.reports.len(),
        workspaces = groups.len(),
        degraded = catalog.degraded_sources.len(),
        "report discovery finished"
    );
    catalog
}

/// Reports visible to the caller, sorted; failing sources are logged and skipped.
pub async fn list_available_reports(api: &PowerBiApi, token: &Credential) -> Vec<ReportDescriptor> {
    discover_reports(api, token).await.reports
}

async fn fetch_personal_reports(api: &PowerBiApi, token: &Credential) -> AppResult<Vec<ReportDescriptor>> {
    let reports: Vec<ApiReport> = api
        .get_list(
            token,
            api.reports_url(),
            ErrorCode::DiscoveryFetchFailed,
            "List My Workspace reports failed",
        )
        .await?;
    Ok(reports
        .into_iter()
        .map(|r| ReportDescriptor::from_api(r, None, MY_WORKSPACE_NAME))
        .collect())
}

async fn fetch_group_reports(
    api: &PowerBiApi,
    token: &Credential,
    group: &ApiGroup,
) -> AppResult<Vec<ReportDescriptor>> {
    let reports: Vec<ApiReport> = api
        .get_list(
            token,
            api.group_reports_url(&group.id),
            ErrorCode::DiscoveryFetchFailed,
            "List workspace reports failed",
        )
        .await?;
    Ok(reports
        .into_iter()
        .map(|r| ReportDescriptor::from_api(r, Some(&group.id), &group.name))
        .collect())
}
