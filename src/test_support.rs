//! Usage: Public test helpers for integration tests (manual clock, scripted identity, fake JWTs).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use crate::auth::credential::{Account, Credential};
use crate::auth::identity::IdentityClient;
use crate::shared::error::AppResult;
use crate::shared::error_code::ErrorCode;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::{now_unix_seconds, Clock};

/// Unsigned JWT carrying `claims`; enough for claim decoding, never for a real service.
pub fn fake_jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Credential whose JWT expires `expires_in_secs` from now.
pub fn credential_expiring_in(expires_in_secs: i64) -> Credential {
    Credential::new(fake_jwt(json!({
        "exp": now_unix_seconds() + expires_in_secs,
        "aud": "https://analysis.windows.net/powerbi/api",
    })))
}

pub fn test_account(username: &str) -> Account {
    Account {
        username: username.to_string(),
        name: Some("Test User".to_string()),
        home_account_id: Some(format!("{username}.tenant")),
    }
}

/// Clock that only moves when slept on or advanced; sleeps return immediately.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    sleeps: AtomicUsize,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock_or_recover();
        *elapsed += by;
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.elapsed.lock_or_recover()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
        futures::future::ready(()).boxed()
    }
}

/// Identity client that replays queued outcomes and counts calls.
///
/// An exhausted queue fails with the matching acquisition error unless a fallback is set.
#[derive(Debug, Default)]
pub struct ScriptedIdentityClient {
    account: Mutex<Option<Account>>,
    sign_in_account: Mutex<Option<Account>>,
    silent: Mutex<VecDeque<AppResult<Credential>>>,
    fallback_silent: Mutex<Option<Credential>>,
    interactive: Mutex<VecDeque<AppResult<Credential>>>,
    silent_calls: AtomicUsize,
    interactive_calls: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl ScriptedIdentityClient {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(account: Account) -> Self {
        let client = Self::default();
        *client.account.lock_or_recover() = Some(account);
        client
    }

    /// Account that becomes active after a successful interactive acquisition.
    pub fn with_sign_in_account(self, account: Account) -> Self {
        *self.sign_in_account.lock_or_recover() = Some(account);
        self
    }

    /// Silent result once the queue is empty, instead of a failure.
    pub fn with_fallback_silent(self, credential: Credential) -> Self {
        *self.fallback_silent.lock_or_recover() = Some(credential);
        self
    }

    pub fn push_silent(&self, outcome: AppResult<Credential>) -> &Self {
        self.silent.lock_or_recover().push_back(outcome);
        self
    }

    pub fn push_interactive(&self, outcome: AppResult<Credential>) -> &Self {
        self.interactive.lock_or_recover().push_back(outcome);
        self
    }

    pub fn silent_calls(&self) -> usize {
        self.silent_calls.load(Ordering::SeqCst)
    }

    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

impl IdentityClient for ScriptedIdentityClient {
    fn active_account(&self) -> Option<Account> {
        self.account.lock_or_recover().clone()
    }

    fn acquire_silent<'a>(
        &'a self,
        _account: &'a Account,
        _scopes: &'a [String],
    ) -> BoxFuture<'a, AppResult<Credential>> {
        self.silent_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.silent.lock_or_recover().pop_front();
        let outcome = queued.unwrap_or_else(|| {
            self.fallback_silent
                .lock_or_recover()
                .clone()
                .ok_or_else(|| ErrorCode::SilentAcquisitionFailed.error("no scripted silent outcome"))
        });
        futures::future::ready(outcome).boxed()
    }

    fn acquire_interactive<'a>(&'a self, _scopes: &'a [String]) -> BoxFuture<'a, AppResult<Credential>> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.interactive.lock_or_recover().pop_front().unwrap_or_else(|| {
            Err(ErrorCode::InteractiveAcquisitionFailed.error("no scripted interactive outcome"))
        });
        if outcome.is_ok() {
            let sign_in_account = self.sign_in_account.lock_or_recover().clone();
            let mut account = self.account.lock_or_recover();
            if let Some(next) = sign_in_account {
                *account = Some(next);
            }
        }
        futures::future::ready(outcome).boxed()
    }

    fn sign_out(&self) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.account.lock_or_recover() = None;
    }
}
