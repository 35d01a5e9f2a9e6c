use std::sync::Arc;

use pbi_org_embed_lib::auth::token_provider::{AcquisitionAttempt, TokenProvider};
use pbi_org_embed_lib::shared::error_code::ErrorCode;
use pbi_org_embed_lib::test_support::{credential_expiring_in, test_account, ScriptedIdentityClient};

fn scopes() -> Vec<String> {
    vec!["https://analysis.windows.net/powerbi/api/Report.Read.All".to_string()]
}

#[tokio::test]
async fn silent_success_skips_interactive() {
    let identity = Arc::new(ScriptedIdentityClient::signed_in(test_account("a@contoso.com")));
    let silent = credential_expiring_in(3600);
    identity.push_silent(Ok(silent.clone()));
    let provider = TokenProvider::new(identity.clone(), scopes());

    let token = provider.acquire_token().await.expect("token");

    assert_eq!(token.access_token(), silent.access_token());
    assert_eq!(identity.silent_calls(), 1);
    assert_eq!(identity.interactive_calls(), 0);
}

#[tokio::test]
async fn silent_failure_falls_back_to_one_interactive_attempt() {
    let identity = Arc::new(ScriptedIdentityClient::signed_in(test_account("a@contoso.com")));
    let interactive = credential_expiring_in(1800);
    identity
        .push_silent(Err(ErrorCode::SilentAcquisitionFailed.error("interaction_required")))
        .push_interactive(Ok(interactive.clone()));
    let provider = TokenProvider::new(identity.clone(), scopes());

    let token = provider.acquire_token().await.expect("token");

    assert_eq!(token.access_token(), interactive.access_token());
    assert_eq!(identity.silent_calls(), 1);
    assert_eq!(identity.interactive_calls(), 1);
}

#[tokio::test]
async fn both_attempts_failing_returns_the_interactive_error() {
    let identity = Arc::new(ScriptedIdentityClient::signed_in(test_account("a@contoso.com")));
    identity
        .push_silent(Err(ErrorCode::SilentAcquisitionFailed.error("expired")))
        .push_interactive(Err(ErrorCode::SystemError.error("popup closed")));
    let provider = TokenProvider::new(identity.clone(), scopes());

    let err = provider.acquire_token().await.expect_err("both fail");

    assert_eq!(err.code(), "AUTH_INTERACTIVE_FAILED");
    assert!(err.message().contains("popup closed"), "{}", err.message());
    assert_eq!(identity.interactive_calls(), 1);
}

#[tokio::test]
async fn no_active_account_fails_without_calling_identity() {
    let identity = Arc::new(ScriptedIdentityClient::signed_out());
    let provider = TokenProvider::new(identity.clone(), scopes());

    let err = provider.acquire_token().await.expect_err("no account");

    assert_eq!(err.code(), "AUTH_NO_ACTIVE_SESSION");
    assert_eq!(err.message(), "No active account.");
    assert_eq!(identity.silent_calls(), 0);
    assert_eq!(identity.interactive_calls(), 0);
}

#[tokio::test]
async fn silent_only_sequence_never_prompts() {
    let identity = Arc::new(ScriptedIdentityClient::signed_in(test_account("a@contoso.com")));
    identity.push_silent(Err(ErrorCode::SilentAcquisitionFailed.error("expired")));
    let provider = TokenProvider::new(identity.clone(), scopes())
        .with_attempts(vec![AcquisitionAttempt::Silent]);

    let err = provider.acquire_token().await.expect_err("silent fails");

    assert!(err.is(ErrorCode::SilentAcquisitionFailed));
    assert_eq!(identity.interactive_calls(), 0);
}
