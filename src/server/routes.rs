//! Usage: Router for the embed host (API, config script, static page with index fallback).

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::EmbedHostState;
use crate::commands::{app, export, reports, session};

pub(crate) fn build_router(state: EmbedHostState) -> Router {
    let public_dir = state.settings.public_dir.clone();
    let index = public_dir.join("index.html");
    let static_files = ServeDir::new(&public_dir).fallback(ServeFile::new(index));

    let api = Router::new()
        .route("/health", get(app::health))
        .route("/session", get(session::get_session))
        .route("/session/sign-in", post(session::sign_in))
        .route("/session/sign-out", post(session::sign_out))
        .route("/reports", get(reports::list_reports))
        .route("/embed", post(reports::embed_report))
        .route("/export", post(export::export_pdf));

    Router::new()
        .route("/app-config.js", get(app::app_config_script))
        .nest("/api", api)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
