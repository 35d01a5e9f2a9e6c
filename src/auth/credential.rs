//! Usage: Bearer credential + signed-in account, decoded from JWT claim payloads.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::shared::security::mask_token;

/// Seconds before expiry at which a cached token is no longer handed out.
pub const REFRESH_LEAD_SECS: i64 = 5 * 60;

/// Opaque bearer token plus the expiry read from its `exp` claim.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    expires_at: Option<i64>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let expires_at = decode_jwt_claims(&access_token)
            .as_ref()
            .and_then(|claims| claims.get("exp"))
            .and_then(parse_i64_lossy);
        Self {
            access_token,
            expires_at,
        }
    }

    /// Prefer the JWT `exp`; fall back to the expiry reported by the token endpoint.
    pub fn with_fallback_expiry(access_token: impl Into<String>, expires_at: Option<i64>) -> Self {
        let mut credential = Self::new(access_token);
        if credential.expires_at.is_none() {
            credential.expires_at = expires_at;
        }
        credential
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn expires_in_text(&self, now_unix: i64) -> String {
        format_expiry(self.expires_at, now_unix)
    }

    pub fn is_usable_at(&self, now_unix: i64) -> bool {
        !should_refresh_now(self.expires_at, REFRESH_LEAD_SECS, now_unix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask_token(&self.access_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub username: String,
    pub name: Option<String>,
    pub home_account_id: Option<String>,
}

impl Account {
    pub fn from_id_token(id_token: &str) -> Option<Self> {
        let claims = decode_jwt_claims(id_token)?;
        let claim = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let username = claim("preferred_username")
            .or_else(|| claim("upn"))
            .or_else(|| claim("email"))?;
        let home_account_id = match (claim("oid"), claim("tid")) {
            (Some(oid), Some(tid)) => Some(format!("{oid}.{tid}")),
            (Some(oid), None) => Some(oid),
            _ => None,
        };

        Some(Self {
            username,
            name: claim("name"),
            home_account_id,
        })
    }

    pub fn same_identity(&self, other: &Account) -> bool {
        match (&self.home_account_id, &other.home_account_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.username.eq_ignore_ascii_case(&other.username),
        }
    }
}

pub(crate) fn decode_jwt_claims(token: &str) -> Option<Value> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.is_object().then_some(claims)
}

pub(crate) fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn should_refresh_now(expires_at: Option<i64>, refresh_lead_s: i64, now_unix: i64) -> bool {
    let Some(expiry) = expires_at else {
        return false;
    };
    let lead = refresh_lead_s.max(0);
    expiry.saturating_sub(lead) <= now_unix
}

pub fn format_expiry(expires_at: Option<i64>, now_unix: i64) -> String {
    let Some(expiry) = expires_at else {
        return "unknown".to_string();
    };
    let remaining = expiry.saturating_sub(now_unix);
    if remaining <= 0 {
        return "expired".to_string();
    }
    format!("{}m {}s", remaining / 60, remaining % 60)
}
