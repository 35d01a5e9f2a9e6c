//! Usage: Session endpoints (state snapshot, sign-in, sign-out).

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::ApiError;
use crate::domain::session::SessionSnapshot;
use crate::server::EmbedHostState;
use crate::shared::error_code::ErrorCode;

const AUTHORIZE_URL_WAIT: Duration = Duration::from_secs(10);

pub(crate) async fn get_session(State(state): State<EmbedHostState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInResponse {
    /// Set while the sign-in waits for the browser; the page opens it and polls `/api/session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    authorize_url: Option<String>,
    session: SessionSnapshot,
}

/// Starts the interactive sign-in in the background.
///
/// Answers 202 with the authorization URL once it is known, or 200 when the sign-in finished
/// first (cached/immediate outcome).
pub(crate) async fn sign_in(
    State(state): State<EmbedHostState>,
) -> Result<(StatusCode, Json<SignInResponse>), ApiError> {
    let mut urls = state.sign_in.subscribe();
    let session = state.session.clone();
    let mut task = tokio::spawn(async move { session.sign_in().await });

    let wait = tokio::time::timeout(AUTHORIZE_URL_WAIT, async {
        tokio::select! {
            changed = urls.changed() => match changed {
                Ok(()) => SignInProgress::AwaitingBrowser(urls.borrow_and_update().clone()),
                Err(_) => SignInProgress::AwaitingBrowser(None),
            },
            joined = &mut task => SignInProgress::Finished(joined),
        }
    })
    .await;

    match wait {
        Ok(SignInProgress::AwaitingBrowser(authorize_url)) => Ok((
            StatusCode::ACCEPTED,
            Json(SignInResponse {
                authorize_url,
                session: state.session.snapshot(),
            }),
        )),
        Ok(SignInProgress::Finished(Ok(result))) => {
            let session = result?;
            Ok((
                StatusCode::OK,
                Json(SignInResponse {
                    authorize_url: None,
                    session,
                }),
            ))
        }
        Ok(SignInProgress::Finished(Err(join_err))) => Err(ErrorCode::SystemError
            .error(format!("sign-in task failed: {join_err}"))
            .into()),
        Err(_) => Err(ErrorCode::InteractiveAcquisitionFailed
            .error("sign-in did not produce an authorization URL in time")
            .into()),
    }
}

enum SignInProgress {
    AwaitingBrowser(Option<String>),
    Finished(Result<crate::shared::error::AppResult<SessionSnapshot>, tokio::task::JoinError>),
}

pub(crate) async fn sign_out(State(state): State<EmbedHostState>) -> Json<SessionSnapshot> {
    state.session.sign_out();
    Json(state.session.snapshot())
}
