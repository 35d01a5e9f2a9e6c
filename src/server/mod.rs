//! Usage: Embed host HTTP server (router, lifecycle, listen address parsing).

pub(crate) mod listen;
pub mod manager;
pub(crate) mod routes;
pub mod sign_in;

use std::sync::Arc;

use crate::domain::session::SessionController;
use crate::infra::settings::AppSettings;

pub use manager::{EmbedServer, ServerStatus};
pub use sign_in::SignInBroker;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct EmbedHostState {
    pub settings: Arc<AppSettings>,
    pub session: Arc<SessionController>,
    pub sign_in: Arc<SignInBroker>,
}
