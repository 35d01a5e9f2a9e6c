//! Usage: Application settings read from the process environment (schema, defaults, parsing).

use serde::Serialize;
use std::path::PathBuf;

pub const PLACEHOLDER_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const DEFAULT_TENANT_ID: &str = "common";
pub const DEFAULT_APP_URL: &str = "https://app.powerbi.com";
pub const DEFAULT_API_URL: &str = "https://api.powerbi.com/v1.0/myorg";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_USE_DYNAMIC_REPORT_SELECTION: bool = true;
const DEFAULT_SCOPES: [&str; 2] = [
    "https://analysis.windows.net/powerbi/api/Report.Read.All",
    "https://analysis.windows.net/powerbi/api/Group.Read.All",
];
const TRUTHY_VALUES: [&str; 4] = ["1", "true", "yes", "on"];

/// Settings whose placeholder value makes the embed unusable.
pub const REQUIRED_CLIENT_SETTINGS: [&str; 4] = [
    "AAD_CLIENT_ID",
    "AAD_TENANT_ID",
    "POWER_BI_WORKSPACE_ID",
    "POWER_BI_REPORT_ID",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub aad_client_id: String,
    pub aad_tenant_id: String,
    pub power_bi_workspace_id: String,
    pub power_bi_report_id: String,
    pub use_dynamic_report_selection: bool,
    pub power_bi_app_url: String,
    pub power_bi_api_url: String,
    pub power_bi_scopes: Vec<String>,
    pub listen_host: String,
    pub port: u16,
    pub public_dir: PathBuf,
    // 0 lets the OS pick a free loopback port for the sign-in callback.
    pub auth_redirect_port: u16,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            aad_client_id: PLACEHOLDER_ID.to_string(),
            aad_tenant_id: DEFAULT_TENANT_ID.to_string(),
            power_bi_workspace_id: PLACEHOLDER_ID.to_string(),
            power_bi_report_id: PLACEHOLDER_ID.to_string(),
            use_dynamic_report_selection: DEFAULT_USE_DYNAMIC_REPORT_SELECTION,
            power_bi_app_url: DEFAULT_APP_URL.to_string(),
            power_bi_api_url: DEFAULT_API_URL.to_string(),
            power_bi_scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            port: DEFAULT_PORT,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            auth_redirect_port: 0,
            log_dir: None,
        }
    }
}

/// The non-secret subset handed to the browser page as `window.__POWER_BI_EMBED_CONFIG`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClientConfig {
    pub aad_client_id: String,
    pub aad_tenant_id: String,
    pub power_bi_workspace_id: String,
    pub power_bi_report_id: String,
    pub power_bi_use_dynamic_report_selection: bool,
    pub power_bi_app_url: String,
    pub power_bi_scopes: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn to_boolean(value: Option<&str>, fallback: bool) -> bool {
    match value {
        None => fallback,
        Some(raw) if raw.is_empty() => fallback,
        Some(raw) => {
            let normalized = raw.trim().to_ascii_lowercase();
            TRUTHY_VALUES.contains(&normalized.as_str())
        }
    }
}

pub(crate) fn to_scopes(value: Option<&str>, fallback: &[String]) -> Vec<String> {
    let Some(raw) = value else {
        return fallback.to_vec();
    };
    let scopes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect();
    if scopes.is_empty() {
        fallback.to_vec()
    } else {
        scopes
    }
}

pub(crate) fn sanitize_url(value: Option<&str>, fallback: &str) -> String {
    let url = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback);
    url.strip_suffix('/').unwrap_or(url).to_string()
}

impl AppSettings {
    /// Build settings from an arbitrary variable lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();

        let listen = non_empty(lookup("LISTEN_ADDRESS")).unwrap_or_default();
        let parsed = crate::server::listen::parse_listen_address(&listen)
            .map_err(|e| format!("SEC_INVALID_INPUT: LISTEN_ADDRESS: {e}"))?;
        let port = match non_empty(lookup("PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| format!("SEC_INVALID_INPUT: PORT must be a port number, got {raw:?}"))?,
            None => parsed.port.unwrap_or(defaults.port),
        };
        let auth_redirect_port = match non_empty(lookup("AAD_REDIRECT_PORT")) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                format!("SEC_INVALID_INPUT: AAD_REDIRECT_PORT must be a port number, got {raw:?}")
            })?,
            None => defaults.auth_redirect_port,
        };

        Ok(Self {
            aad_client_id: non_empty(lookup("AAD_CLIENT_ID")).unwrap_or(defaults.aad_client_id),
            aad_tenant_id: non_empty(lookup("AAD_TENANT_ID")).unwrap_or(defaults.aad_tenant_id),
            power_bi_workspace_id: non_empty(lookup("POWER_BI_WORKSPACE_ID"))
                .unwrap_or(defaults.power_bi_workspace_id),
            power_bi_report_id: non_empty(lookup("POWER_BI_REPORT_ID"))
                .unwrap_or(defaults.power_bi_report_id),
            use_dynamic_report_selection: to_boolean(
                lookup("POWER_BI_USE_DYNAMIC_REPORT_SELECTION").as_deref(),
                defaults.use_dynamic_report_selection,
            ),
            power_bi_app_url: sanitize_url(
                lookup("POWER_BI_APP_URL").as_deref(),
                &defaults.power_bi_app_url,
            ),
            power_bi_api_url: sanitize_url(
                lookup("POWER_BI_API_URL").as_deref(),
                &defaults.power_bi_api_url,
            ),
            power_bi_scopes: to_scopes(
                lookup("POWER_BI_SCOPES").as_deref(),
                &defaults.power_bi_scopes,
            ),
            listen_host: parsed.host,
            port,
            public_dir: non_empty(lookup("PUBLIC_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            auth_redirect_port,
            log_dir: non_empty(lookup("LOG_DIR")).map(PathBuf::from),
        })
    }

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            aad_client_id: self.aad_client_id.clone(),
            aad_tenant_id: self.aad_tenant_id.clone(),
            power_bi_workspace_id: self.power_bi_workspace_id.clone(),
            power_bi_report_id: self.power_bi_report_id.clone(),
            power_bi_use_dynamic_report_selection: self.use_dynamic_report_selection,
            power_bi_app_url: self.power_bi_app_url.clone(),
            power_bi_scopes: self.power_bi_scopes.clone(),
        }
    }

    /// Body of `/app-config.js`.
    pub fn client_config_script(&self) -> Result<String, String> {
        let json = serde_json::to_string(&self.client_config())
            .map_err(|e| format!("SYSTEM_ERROR: failed to serialize client config: {e}"))?;
        Ok(format!("window.__POWER_BI_EMBED_CONFIG = {json};"))
    }

    pub fn missing_required_settings(&self) -> Vec<&'static str> {
        REQUIRED_CLIENT_SETTINGS
            .iter()
            .copied()
            .filter(|key| {
                let (value, placeholder) = match *key {
                    "AAD_CLIENT_ID" => (&self.aad_client_id, PLACEHOLDER_ID),
                    "AAD_TENANT_ID" => (&self.aad_tenant_id, DEFAULT_TENANT_ID),
                    "POWER_BI_WORKSPACE_ID" => (&self.power_bi_workspace_id, PLACEHOLDER_ID),
                    _ => (&self.power_bi_report_id, PLACEHOLDER_ID),
                };
                value.is_empty() || value == placeholder
            })
            .collect()
    }

    pub fn log_missing_required_settings(&self) {
        let missing = self.missing_required_settings();
        if missing.is_empty() {
            return;
        }
        tracing::warn!(
            missing = ?missing,
            "missing recommended environment variables for the embed config: {}; placeholder ids will be used",
            missing.join(", ")
        );
    }
}
