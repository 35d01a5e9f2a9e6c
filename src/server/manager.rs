//! Usage: Embed host lifecycle (bind, serve with graceful shutdown, status).

use std::net::SocketAddr;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::listen;
use super::routes::build_router;
use super::EmbedHostState;
use crate::shared::error::AppResult;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub running: bool,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub listen_addr: Option<String>,
}

struct RunningServer {
    port: u16,
    base_url: String,
    listen_addr: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub struct EmbedServer {
    running: Option<RunningServer>,
}

impl EmbedServer {
    pub fn status(&self) -> ServerStatus {
        match &self.running {
            Some(r) => ServerStatus {
                running: true,
                port: Some(r.port),
                base_url: Some(r.base_url.clone()),
                listen_addr: Some(r.listen_addr.clone()),
            },
            None => ServerStatus {
                running: false,
                port: None,
                base_url: None,
                listen_addr: None,
            },
        }
    }

    /// Bind `host:port` (port 0 picks a free one) and serve until `stop`.
    pub async fn start(&mut self, state: EmbedHostState, host: &str, port: u16) -> AppResult<ServerStatus> {
        if self.running.is_some() {
            return Ok(self.status());
        }

        let requested = listen::format_host_port(host, port);
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .map_err(|e| format!("SYSTEM_ERROR: failed to bind {requested}: {e}"))?;
        let bind_addr = listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], port)));
        let port = bind_addr.port();
        let listen_addr = listen::format_host_port(host, port);
        let base_url = listen::public_origin(host, port);

        let app = build_router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                tracing::error!(bind_addr = %bind_addr, "embed host server error: {}", err);
            }
        });

        tracing::info!(listen_addr = %listen_addr, base_url = %base_url, "embed host listening");
        self.running = Some(RunningServer {
            port,
            base_url,
            listen_addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(self.status())
    }

    pub async fn stop(&mut self) -> ServerStatus {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            if let Err(err) = running.task.await {
                tracing::warn!("embed host task ended abnormally: {}", err);
            }
            tracing::info!(listen_addr = %running.listen_addr, "embed host stopped");
        }
        self.status()
    }
}
