//! Usage: Bearer credential acquisition as an explicit attempt sequence (silent, then interactive).

use std::sync::Arc;

use crate::auth::credential::{Account, Credential};
use crate::auth::identity::IdentityClient;
use crate::shared::error::{AppError, AppResult};
use crate::shared::error_code::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionAttempt {
    Silent,
    Interactive,
}

impl AcquisitionAttempt {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Interactive => "interactive",
        }
    }

    const fn failure_code(self) -> ErrorCode {
        match self {
            Self::Silent => ErrorCode::SilentAcquisitionFailed,
            Self::Interactive => ErrorCode::InteractiveAcquisitionFailed,
        }
    }
}

pub const SILENT_THEN_INTERACTIVE: [AcquisitionAttempt; 2] =
    [AcquisitionAttempt::Silent, AcquisitionAttempt::Interactive];

pub struct TokenProvider {
    identity: Arc<dyn IdentityClient>,
    scopes: Vec<String>,
    attempts: Vec<AcquisitionAttempt>,
}

impl TokenProvider {
    pub fn new(identity: Arc<dyn IdentityClient>, scopes: Vec<String>) -> Self {
        Self {
            identity,
            scopes,
            attempts: SILENT_THEN_INTERACTIVE.to_vec(),
        }
    }

    /// Replace the attempt sequence, e.g. `[Silent]` for callers that must never prompt.
    pub fn with_attempts(mut self, attempts: Vec<AcquisitionAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn identity(&self) -> &Arc<dyn IdentityClient> {
        &self.identity
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn active_account(&self) -> Option<Account> {
        self.identity.active_account()
    }

    /// A valid credential for the active account.
    ///
    /// Attempts run in order; the first success wins and the last failure is returned.
    /// There is no retry beyond the sequence itself.
    pub async fn acquire_token(&self) -> AppResult<Credential> {
        let account = self
            .identity
            .active_account()
            .ok_or_else(|| ErrorCode::NoActiveSession.error("No active account."))?;

        let mut last_err: Option<AppError> = None;
        for (idx, attempt) in self.attempts.iter().copied().enumerate() {
            let result = match attempt {
                AcquisitionAttempt::Silent => {
                    self.identity.acquire_silent(&account, &self.scopes).await
                }
                AcquisitionAttempt::Interactive => {
                    self.identity.acquire_interactive(&self.scopes).await
                }
            };

            match result {
                Ok(credential) => {
                    tracing::debug!(
                        attempt = attempt.as_str(),
                        username = %account.username,
                        "token acquired"
                    );
                    return Ok(credential);
                }
                Err(err) => {
                    let err = classify(attempt, err);
                    if let Some(next) = self.attempts.get(idx + 1) {
                        tracing::warn!(
                            attempt = attempt.as_str(),
                            next = next.as_str(),
                            "token acquisition failed, falling back: {}",
                            err
                        );
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ErrorCode::SystemError.error("token provider has no acquisition attempts configured")
        }))
    }
}

fn classify(attempt: AcquisitionAttempt, err: AppError) -> AppError {
    let code = attempt.failure_code();
    if err.is(code) || err.is(ErrorCode::NoActiveSession) {
        return err;
    }
    code.error(err.to_string()).with_source(err)
}
