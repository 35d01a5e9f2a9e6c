//! Usage: Entra token endpoint helpers (authorization_code + refresh_token grants).

use crate::auth::authority::request_scope_param;
use crate::auth::credential::parse_i64_lossy;
use crate::shared::error::AppResult;
use crate::shared::security::error_body_snippet;
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) struct TokenExchangeRequest {
    pub(crate) token_uri: String,
    pub(crate) client_id: String,
    pub(crate) code: String,
    pub(crate) redirect_uri: String,
    pub(crate) code_verifier: String,
    pub(crate) scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenRefreshRequest {
    pub(crate) token_uri: String,
    pub(crate) client_id: String,
    pub(crate) refresh_token: String,
    pub(crate) scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) expires_at: Option<i64>,
    pub(crate) id_token: Option<String>,
}

pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    req: &TokenExchangeRequest,
) -> AppResult<TokenResponse> {
    let scope = request_scope_param(&req.scopes);
    let form = [
        ("grant_type", "authorization_code"),
        ("client_id", req.client_id.trim()),
        ("code", req.code.trim()),
        ("redirect_uri", req.redirect_uri.trim()),
        ("code_verifier", req.code_verifier.trim()),
        ("scope", scope.as_str()),
    ];

    let response = client
        .post(req.token_uri.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: token exchange request failed: {e}"))?;

    parse_token_response(response).await
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    req: &TokenRefreshRequest,
) -> AppResult<TokenResponse> {
    let scope = request_scope_param(&req.scopes);
    let form = [
        ("grant_type", "refresh_token"),
        ("client_id", req.client_id.trim()),
        ("refresh_token", req.refresh_token.trim()),
        ("scope", scope.as_str()),
    ];

    let response = client
        .post(req.token_uri.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: token refresh request failed: {e}"))?;

    parse_token_response(response).await
}

async fn parse_token_response(response: reqwest::Response) -> AppResult<TokenResponse> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: token response read failed: {e}"))?;

    if !status.is_success() {
        let (error_code, error_message) = parse_oauth_error_details(&body);
        let mut msg = if requires_interaction(error_code.as_deref()) {
            format!(
                "AUTH_SILENT_FAILED: interaction required (status={})",
                status.as_u16()
            )
        } else {
            format!(
                "SYSTEM_ERROR: token endpoint returned status={}",
                status.as_u16()
            )
        };
        if let Some(code) = error_code {
            msg.push_str(" code=");
            msg.push_str(code.as_str());
        }
        if let Some(detail) = error_message {
            msg.push_str(" message=");
            // AADSTS descriptions carry trace/correlation ids on later lines.
            let first_line = detail.lines().next().unwrap_or_default();
            msg.push_str(first_line.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(error_body_snippet(&body).as_str());
        return Err(msg.into());
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| format!("SYSTEM_ERROR: token response json invalid: {e}"))?;
    let text_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let access_token = text_field("access_token")
        .ok_or_else(|| "SYSTEM_ERROR: token response missing access_token".to_string())?;
    let expires_at = value
        .get("expires_in")
        .and_then(parse_i64_lossy)
        .filter(|v| *v > 0)
        .map(|v| crate::shared::time::now_unix_seconds().saturating_add(v));

    Ok(TokenResponse {
        access_token,
        refresh_token: text_field("refresh_token"),
        expires_at,
        id_token: text_field("id_token"),
    })
}

fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };
    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut code = text(value.get("code"));
    let mut message = text(value.get("error_description"));

    match value.get("error") {
        Some(Value::String(err)) if code.is_none() => code = Some(err.trim().to_string()),
        Some(Value::Object(err_obj)) => {
            if code.is_none() {
                code = text(err_obj.get("code")).or_else(|| text(err_obj.get("type")));
            }
            if message.is_none() {
                message = text(err_obj.get("message"));
            }
        }
        _ => {}
    }

    (code, message)
}

/// Errors the token endpoint returns when only a user-facing prompt can recover.
fn requires_interaction(code: Option<&str>) -> bool {
    code.map(str::trim).is_some_and(|code| {
        ["interaction_required", "consent_required", "login_required", "invalid_grant"]
            .iter()
            .any(|known| code.eq_ignore_ascii_case(known))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_oauth_error_details_supports_entra_fields() {
        let payload = r#"{
          "error": "invalid_grant",
          "error_description": "AADSTS70008: The refresh token has expired.\r\nTrace ID: abc",
          "error_codes": [70008]
        }"#;

        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("invalid_grant"));
        assert!(message
            .as_deref()
            .is_some_and(|m| m.starts_with("AADSTS70008")));
    }

    #[test]
    fn parse_oauth_error_details_supports_nested_error_payload() {
        let payload = r#"{"error": {"code": "TokenExpired", "message": "token expired"}}"#;
        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("TokenExpired"));
        assert_eq!(message.as_deref(), Some("token expired"));
    }

    #[test]
    fn parse_oauth_error_details_ignores_non_json() {
        assert_eq!(parse_oauth_error_details("<html>"), (None, None));
    }

    #[test]
    fn interaction_required_codes_are_detected() {
        assert!(requires_interaction(Some("interaction_required")));
        assert!(requires_interaction(Some("INVALID_GRANT")));
        assert!(!requires_interaction(Some("invalid_client")));
        assert!(!requires_interaction(None));
    }
}
