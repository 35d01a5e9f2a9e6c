//! Usage: Microsoft Entra ID endpoint layout and authorize-URL construction.

use crate::shared::error::AppResult;
use reqwest::Url;

pub const DEFAULT_LOGIN_HOST: &str = "https://login.microsoftonline.com";
pub(crate) const REDIRECT_HOST: &str = "localhost";
pub(crate) const CALLBACK_PATH: &str = "/auth/callback";
const OIDC_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntraEndpoints {
    authority: String,
}

impl EntraEndpoints {
    pub(crate) fn new(login_host: &str, tenant_id: &str) -> Self {
        let host = login_host.trim().trim_end_matches('/');
        let tenant = tenant_id.trim().trim_matches('/');
        Self {
            authority: format!("{host}/{tenant}"),
        }
    }

    pub(crate) fn authority(&self) -> &str {
        &self.authority
    }

    pub(crate) fn authorize_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority)
    }

    pub(crate) fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }
}

pub(crate) fn make_redirect_uri(port: u16) -> String {
    format!("http://{REDIRECT_HOST}:{port}{CALLBACK_PATH}")
}

/// Resource scopes plus the OIDC scopes needed for an ID token and a refresh token.
pub(crate) fn request_scope_param(scopes: &[String]) -> String {
    let mut all: Vec<&str> = Vec::with_capacity(scopes.len() + OIDC_SCOPES.len());
    for scope in scopes.iter().map(String::as_str).chain(OIDC_SCOPES) {
        let scope = scope.trim();
        if !scope.is_empty() && !all.contains(&scope) {
            all.push(scope);
        }
    }
    all.join(" ")
}

pub(crate) struct AuthorizeRequest<'a> {
    pub(crate) client_id: &'a str,
    pub(crate) redirect_uri: &'a str,
    pub(crate) scopes: &'a [String],
    pub(crate) state: &'a str,
    pub(crate) code_challenge: &'a str,
}

pub(crate) fn build_authorize_url(
    endpoints: &EntraEndpoints,
    req: &AuthorizeRequest<'_>,
) -> AppResult<String> {
    let scope = request_scope_param(req.scopes);
    let url = Url::parse_with_params(
        &endpoints.authorize_url(),
        &[
            ("client_id", req.client_id.trim()),
            ("response_type", "code"),
            ("redirect_uri", req.redirect_uri),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
            ("state", req.state),
            ("code_challenge", req.code_challenge),
            ("code_challenge_method", "S256"),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| format!("SEC_INVALID_INPUT: invalid authority url: {e}"))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_derived_from_tenant() {
        let endpoints = EntraEndpoints::new("https://login.microsoftonline.com/", "common");
        assert_eq!(endpoints.authority(), "https://login.microsoftonline.com/common");
        assert_eq!(
            endpoints.token_url(),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );
    }

    #[test]
    fn scope_param_appends_oidc_scopes_once() {
        let scopes = vec![
            "https://analysis.windows.net/powerbi/api/Report.Read.All".to_string(),
            "openid".to_string(),
        ];
        assert_eq!(
            request_scope_param(&scopes),
            "https://analysis.windows.net/powerbi/api/Report.Read.All openid profile offline_access"
        );
    }

    #[test]
    fn authorize_url_carries_pkce_and_state() {
        let endpoints = EntraEndpoints::new(DEFAULT_LOGIN_HOST, "contoso");
        let redirect_uri = make_redirect_uri(53100);
        let scopes = vec!["scope-a".to_string()];
        let url = build_authorize_url(
            &endpoints,
            &AuthorizeRequest {
                client_id: "client-1",
                redirect_uri: &redirect_uri,
                scopes: &scopes,
                state: "state-xyz",
                code_challenge: "challenge",
            },
        )
        .expect("url");

        let parsed = Url::parse(&url).expect("parse");
        assert_eq!(parsed.path(), "/contoso/oauth2/v2.0/authorize");
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_string(), "state-xyz".to_string())));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "S256".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:53100/auth/callback".to_string()
        )));
    }
}
