//! Usage: Embed configuration handed to the browser's Power BI client.

use reqwest::Url;
use serde::Serialize;

use crate::auth::credential::Credential;
use crate::shared::error::AppResult;

/// `{app_url}/reportEmbed?reportId=..&groupId=..` ("embed for your organization").
pub fn build_embed_url(app_url: &str, workspace_id: &str, report_id: &str) -> AppResult<String> {
    let base = app_url.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/reportEmbed"))
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid POWER_BI_APP_URL {base:?}: {e}"))?;
    url.query_pairs_mut()
        .append_pair("reportId", report_id)
        .append_pair("groupId", workspace_id);
    Ok(url.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub token_type: &'static str,
    pub access_token: String,
    pub embed_url: String,
    pub id: String,
    pub settings: EmbedSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedSettings {
    pub panes: EmbedPanes,
    pub layout_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedPanes {
    pub filters: PaneVisibility,
    pub page_navigation: PaneVisibility,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaneVisibility {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

impl EmbedConfig {
    /// Report embed with an Entra (AAD) token: filters pane hidden, page navigation shown.
    pub fn for_report(token: &Credential, report_id: &str, embed_url: &str) -> Self {
        Self {
            kind: "report",
            token_type: "Aad",
            access_token: token.access_token().to_string(),
            embed_url: embed_url.to_string(),
            id: report_id.to_string(),
            settings: EmbedSettings {
                panes: EmbedPanes {
                    filters: PaneVisibility {
                        visible: false,
                        expanded: Some(false),
                    },
                    page_navigation: PaneVisibility {
                        visible: true,
                        expanded: None,
                    },
                },
                layout_type: "Responsive",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_url_carries_report_and_group() {
        let url = build_embed_url("https://app.powerbi.com/", "w-1", "r-1").expect("url");
        assert_eq!(
            url,
            "https://app.powerbi.com/reportEmbed?reportId=r-1&groupId=w-1"
        );
    }

    #[test]
    fn embed_url_rejects_garbage_app_url() {
        assert!(build_embed_url("not a url", "w", "r").is_err());
    }

    #[test]
    fn embed_config_serializes_client_shape() {
        let token = Credential::with_fallback_expiry("tok", None);
        let value = serde_json::to_value(EmbedConfig::for_report(&token, "r-1", "https://e")).expect("json");
        assert_eq!(value["type"], "report");
        assert_eq!(value["tokenType"], "Aad");
        assert_eq!(value["accessToken"], "tok");
        assert_eq!(value["settings"]["panes"]["filters"]["visible"], false);
        assert_eq!(value["settings"]["panes"]["pageNavigation"]["visible"], true);
        assert!(value["settings"]["panes"]["pageNavigation"].get("expanded").is_none());
        assert_eq!(value["settings"]["layoutType"], "Responsive");
    }
}
