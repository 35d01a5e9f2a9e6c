//! Usage: One-shot loopback listener receiving the sign-in redirect (authorization code flow).

use crate::auth::authority::CALLBACK_PATH;
use crate::shared::error::AppResult;
use crate::shared::error_code::ErrorCode;
use crate::shared::security::constant_time_eq;
use reqwest::Url;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SIGNED_IN_HTML: &str =
    "<html><body><h1>Signed in</h1><p>You can close this tab and return to the report.</p></body></html>";
const SIGN_IN_FAILED_HTML: &str =
    "<html><body><h1>Sign-in failed</h1><p>Close this tab and try again.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthRedirectPayload {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) error_description: Option<String>,
}

impl AuthRedirectPayload {
    /// The authorization code, or the identity provider's refusal as an error.
    pub(crate) fn into_code(self) -> AppResult<String> {
        if let Some(error) = self.error {
            let detail = self
                .error_description
                .map(|d| format!("{error}: {d}"))
                .unwrap_or(error);
            return Err(ErrorCode::InteractiveAcquisitionFailed.error(detail));
        }
        self.code
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ErrorCode::InteractiveAcquisitionFailed.error("redirect missing code"))
    }
}

#[derive(Debug)]
pub(crate) struct LoopbackCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl LoopbackCallbackListener {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    async fn accept(&mut self) -> std::io::Result<TcpStream> {
        let (socket, _) = match (self.listener_v4.as_mut(), self.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result?,
                    result = v6.accept() => result?,
                }
            }
            (Some(v4), None) => v4.accept().await?,
            (None, Some(v6)) => v6.accept().await?,
            (None, None) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "no loopback listener bound",
                ))
            }
        };
        Ok(socket)
    }
}

/// Bind the preferred port on 127.0.0.1 and ::1, falling back to an OS-assigned port.
pub(crate) async fn bind_callback_listener(preferred_port: u16) -> AppResult<LoopbackCallbackListener> {
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => {
            Err(format!("SYSTEM_ERROR: sign-in callback bind failed: {preferred_err}").into())
        }
        Err(preferred_err) => {
            tracing::warn!(
                preferred_port,
                "sign-in callback port unavailable, using a dynamic port: {}",
                preferred_err
            );
            try_bind_on_port(0).await.map_err(|fallback_err| {
                format!(
                    "SYSTEM_ERROR: sign-in callback bind failed: {preferred_err}; dynamic port: {fallback_err}"
                )
                .into()
            })
        }
    }
}

async fn bind_pair(port: u16, errors: &mut Vec<String>) -> (Option<TcpListener>, Option<TcpListener>) {
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            errors.push(format!("[::1]:{port} ({err})"));
            None
        }
    };
    (listener_v4, listener_v6)
}

async fn try_bind_on_port(port: u16) -> Result<LoopbackCallbackListener, String> {
    let mut bind_errors: Vec<String> = Vec::new();

    if port != 0 {
        let (listener_v4, listener_v6) = bind_pair(port, &mut bind_errors).await;
        if listener_v4.is_none() && listener_v6.is_none() {
            return Err(bind_errors.join("; "));
        }
        return Ok(LoopbackCallbackListener {
            port,
            listener_v4,
            listener_v6,
        });
    }

    // Dynamic port: let IPv4 pick, then mirror the port on IPv6 when possible.
    let listener_v4 = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| format!("127.0.0.1:0 ({e})"))?;
    let port = listener_v4
        .local_addr()
        .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
        .port();
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            tracing::debug!(port, "ipv6 loopback unavailable for sign-in callback: {}", err);
            None
        }
    };

    Ok(LoopbackCallbackListener {
        port,
        listener_v4: Some(listener_v4),
        listener_v6,
    })
}

/// Serve connections until the redirect for `CALLBACK_PATH` arrives or `timeout` elapses.
///
/// Requests for other paths (a browser's favicon probe, typically) get a 404 and are skipped.
pub(crate) async fn wait_for_redirect(
    mut listener: LoopbackCallbackListener,
    expected_state: &str,
    timeout: Duration,
) -> AppResult<AuthRedirectPayload> {
    tokio::time::timeout(timeout, accept_redirect(&mut listener, expected_state))
        .await
        .map_err(|_| {
            ErrorCode::InteractiveAcquisitionFailed
                .error("sign-in timed out waiting for the browser redirect")
        })?
}

async fn accept_redirect(
    listener: &mut LoopbackCallbackListener,
    expected_state: &str,
) -> AppResult<AuthRedirectPayload> {
    loop {
        let mut socket = listener
            .accept()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: sign-in callback accept failed: {e}"))?;

        let mut buffer = vec![0u8; 8192];
        let size = socket
            .read(&mut buffer)
            .await
            .map_err(|e| format!("SYSTEM_ERROR: sign-in callback read failed: {e}"))?;
        if size == 0 {
            continue;
        }

        let request = String::from_utf8_lossy(&buffer[..size]);
        let Some(target) = extract_request_target(request.as_ref()) else {
            write_html(&mut socket, "HTTP/1.1 400 Bad Request", NOT_FOUND_HTML).await;
            continue;
        };
        let Some(payload) = parse_redirect_target(target)? else {
            write_html(&mut socket, "HTTP/1.1 404 Not Found", NOT_FOUND_HTML).await;
            continue;
        };

        if let Err(err) = validate_state(&payload, expected_state) {
            write_html(&mut socket, "HTTP/1.1 400 Bad Request", SIGN_IN_FAILED_HTML).await;
            return Err(err);
        }

        if payload.error.is_some() {
            write_html(&mut socket, "HTTP/1.1 400 Bad Request", SIGN_IN_FAILED_HTML).await;
        } else {
            write_html(&mut socket, "HTTP/1.1 200 OK", SIGNED_IN_HTML).await;
        }
        return Ok(payload);
    }
}

async fn write_html(socket: &mut TcpStream, status_line: &str, body: &str) {
    let response = format!(
        "{status_line}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn extract_request_target(request: &str) -> Option<&str> {
    let first = request.lines().next()?;
    let mut parts = first.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    (method == "GET" && !target.is_empty()).then_some(target)
}

/// `Ok(None)` when the target is not the sign-in callback path.
pub(crate) fn parse_redirect_target(target: &str) -> AppResult<Option<AuthRedirectPayload>> {
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| format!("SYSTEM_ERROR: invalid sign-in callback target: {e}"))?;
    if url.path() != CALLBACK_PATH {
        return Ok(None);
    }

    let mut payload = AuthRedirectPayload {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => payload.code = Some(value.to_string()),
            "state" => payload.state = Some(value.to_string()),
            "error" => payload.error = Some(value.to_string()),
            "error_description" => payload.error_description = Some(value.to_string()),
            _ => {}
        }
    }

    if payload.code.is_none() && payload.error.is_none() {
        return Err("SYSTEM_ERROR: sign-in callback missing code/error".into());
    }
    Ok(Some(payload))
}

fn validate_state(payload: &AuthRedirectPayload, expected_state: &str) -> AppResult<()> {
    let state = payload
        .state
        .as_deref()
        .ok_or_else(|| "SEC_INVALID_INPUT: sign-in callback missing state".to_string())?;
    if !constant_time_eq(state.as_bytes(), expected_state.as_bytes()) {
        return Err("SEC_INVALID_INPUT: sign-in callback state mismatch".into());
    }
    Ok(())
}
