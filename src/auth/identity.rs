//! Usage: Identity client seam + the Microsoft Entra ID public-client implementation.
//!
//! The token provider only sees `IdentityClient`; `EntraIdentityClient` keeps the signed-in
//! account and its tokens in memory for the lifetime of the process.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::auth::authority::{self, AuthorizeRequest, EntraEndpoints};
use crate::auth::callback_server;
use crate::auth::credential::{Account, Credential};
use crate::auth::pkce;
use crate::auth::token_exchange::{
    exchange_authorization_code, refresh_access_token, TokenExchangeRequest, TokenRefreshRequest,
    TokenResponse,
};
use crate::infra::settings::AppSettings;
use crate::shared::error::{AppError, AppResult};
use crate::shared::error_code::ErrorCode;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::now_unix_seconds;

const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Source of credentials for the signed-in user.
///
/// Object-safe so callers can hold `Arc<dyn IdentityClient>` and tests can script it.
pub trait IdentityClient: Send + Sync {
    fn active_account(&self) -> Option<Account>;

    /// Cache/refresh path; never prompts the user.
    fn acquire_silent<'a>(
        &'a self,
        account: &'a Account,
        scopes: &'a [String],
    ) -> BoxFuture<'a, AppResult<Credential>>;

    /// User-facing challenge; may wait on the user for as long as the client allows.
    fn acquire_interactive<'a>(&'a self, scopes: &'a [String])
        -> BoxFuture<'a, AppResult<Credential>>;

    fn sign_out(&self);
}

/// Opens (or announces) the authorization URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub login_host: String,
    pub tenant_id: String,
    pub client_id: String,
    pub redirect_port: u16,
    pub callback_timeout: Duration,
}

impl IdentityConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            login_host: authority::DEFAULT_LOGIN_HOST.to_string(),
            tenant_id: settings.aad_tenant_id.clone(),
            client_id: settings.aad_client_id.clone(),
            redirect_port: settings.auth_redirect_port,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSession {
    account: Account,
    credential: Credential,
    refresh_token: Option<String>,
    scopes: Vec<String>,
}

impl CachedSession {
    fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }
}

pub struct EntraIdentityClient {
    config: IdentityConfig,
    endpoints: EntraEndpoints,
    http: reqwest::Client,
    launcher: BrowserLauncher,
    cache: Mutex<Option<CachedSession>>,
}

impl EntraIdentityClient {
    pub fn new(config: IdentityConfig, http: reqwest::Client, launcher: BrowserLauncher) -> Self {
        let endpoints = EntraEndpoints::new(&config.login_host, &config.tenant_id);
        Self {
            config,
            endpoints,
            http,
            launcher,
            cache: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<CachedSession> {
        self.cache.lock_or_recover().clone()
    }

    fn store(&self, tokens: TokenResponse, scopes: &[String], previous: Option<&CachedSession>) -> AppResult<Credential> {
        let account = tokens
            .id_token
            .as_deref()
            .and_then(Account::from_id_token)
            .or_else(|| previous.map(|p| p.account.clone()))
            .ok_or_else(|| {
                ErrorCode::InteractiveAcquisitionFailed
                    .error("token response did not identify the signed-in account")
            })?;
        let credential = Credential::with_fallback_expiry(tokens.access_token, tokens.expires_at);
        let refresh_token = tokens
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        *self.cache.lock_or_recover() = Some(CachedSession {
            account,
            credential: credential.clone(),
            refresh_token,
            scopes: scopes.to_vec(),
        });
        Ok(credential)
    }

    async fn silent(&self, account: &Account, scopes: &[String]) -> AppResult<Credential> {
        let cached = self
            .cached()
            .ok_or_else(|| ErrorCode::SilentAcquisitionFailed.error("no cached session"))?;
        if !cached.account.same_identity(account) {
            return Err(ErrorCode::SilentAcquisitionFailed
                .error("cached session belongs to a different account"));
        }
        if cached.covers(scopes) && cached.credential.is_usable_at(now_unix_seconds()) {
            return Ok(cached.credential);
        }

        let refresh_token = cached.refresh_token.clone().ok_or_else(|| {
            ErrorCode::SilentAcquisitionFailed.error("no refresh token cached; interaction required")
        })?;
        let request = TokenRefreshRequest {
            token_uri: self.endpoints.token_url(),
            client_id: self.config.client_id.clone(),
            refresh_token,
            scopes: scopes.to_vec(),
        };
        let tokens = refresh_access_token(&self.http, &request)
            .await
            .map_err(|err| as_code(err, ErrorCode::SilentAcquisitionFailed))?;
        tracing::debug!(username = %cached.account.username, "access token refreshed silently");
        self.store(tokens, scopes, Some(&cached))
    }

    async fn interactive(&self, scopes: &[String]) -> AppResult<Credential> {
        let listener = callback_server::bind_callback_listener(self.config.redirect_port).await?;
        let redirect_uri = authority::make_redirect_uri(listener.port());
        let pkce = pkce::generate_pkce_pair();
        let state = pkce::generate_state();
        let authorize_url = authority::build_authorize_url(
            &self.endpoints,
            &AuthorizeRequest {
                client_id: &self.config.client_id,
                redirect_uri: &redirect_uri,
                scopes,
                state: &state,
                code_challenge: &pkce.code_challenge,
            },
        )?;

        (self.launcher)(&authorize_url);

        let code = callback_server::wait_for_redirect(listener, &state, self.config.callback_timeout)
            .await?
            .into_code()?;
        let request = TokenExchangeRequest {
            token_uri: self.endpoints.token_url(),
            client_id: self.config.client_id.clone(),
            code,
            redirect_uri,
            code_verifier: pkce.code_verifier,
            scopes: scopes.to_vec(),
        };
        let tokens = exchange_authorization_code(&self.http, &request).await?;
        let previous = self.cached();
        let credential = self.store(tokens, scopes, previous.as_ref())?;
        if let Some(account) = self.active_account() {
            tracing::info!(username = %account.username, "signed in");
        }
        Ok(credential)
    }
}

fn as_code(err: AppError, code: ErrorCode) -> AppError {
    if err.is(code) {
        return err;
    }
    code.error(err.message().to_string()).with_source(err)
}

impl IdentityClient for EntraIdentityClient {
    fn active_account(&self) -> Option<Account> {
        self.cache
            .lock_or_recover()
            .as_ref()
            .map(|session| session.account.clone())
    }

    fn acquire_silent<'a>(
        &'a self,
        account: &'a Account,
        scopes: &'a [String],
    ) -> BoxFuture<'a, AppResult<Credential>> {
        self.silent(account, scopes).boxed()
    }

    fn acquire_interactive<'a>(
        &'a self,
        scopes: &'a [String],
    ) -> BoxFuture<'a, AppResult<Credential>> {
        async move {
            self.interactive(scopes)
                .await
                .map_err(|err| as_code(err, ErrorCode::InteractiveAcquisitionFailed))
        }
        .boxed()
    }

    fn sign_out(&self) {
        if let Some(session) = self.cache.lock_or_recover().take() {
            tracing::info!(username = %session.account.username, "signed out; token cache cleared");
        }
    }
}
