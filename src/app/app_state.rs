//! Usage: Wires settings into the shared objects used by the HTTP host and the CLI.

use std::sync::Arc;

use crate::auth::identity::{BrowserLauncher, EntraIdentityClient, IdentityClient, IdentityConfig};
use crate::auth::token_provider::TokenProvider;
use crate::domain::session::{SessionConfig, SessionController};
use crate::infra::powerbi_api::{build_http_client, PowerBiApi};
use crate::infra::settings::AppSettings;
use crate::server::{EmbedHostState, SignInBroker};
use crate::shared::error::AppResult;
use crate::shared::time::{Clock, TokioClock};

/// Session controller backed by the Entra identity client and the live reporting API.
pub fn build_session(settings: &AppSettings, launcher: BrowserLauncher) -> AppResult<Arc<SessionController>> {
    let http = build_http_client()?;
    let identity: Arc<dyn IdentityClient> = Arc::new(EntraIdentityClient::new(
        IdentityConfig::from_settings(settings),
        http.clone(),
        launcher,
    ));
    let tokens = TokenProvider::new(identity, settings.power_bi_scopes.clone());
    let api = PowerBiApi::new(http, &settings.power_bi_api_url)?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    Ok(Arc::new(SessionController::new(
        SessionConfig::from_settings(settings),
        tokens,
        api,
        clock,
    )))
}

/// State for the embed host; interactive sign-ins publish their URL through the broker.
pub fn build_host_state(settings: AppSettings) -> AppResult<EmbedHostState> {
    let sign_in = SignInBroker::new();
    let session = build_session(&settings, sign_in.launcher())?;
    Ok(EmbedHostState {
        settings: Arc::new(settings),
        session,
        sign_in,
    })
}
