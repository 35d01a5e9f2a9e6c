//! Usage: Explicit per-user session state (account, reports, embedded report, export status).
//!
//! Every user action goes through `SessionController`; state lives behind one mutex that is
//! never held across an `.await`.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::auth::credential::{Account, Credential};
use crate::auth::token_provider::TokenProvider;
use crate::domain::discovery::{discover_reports, ReportCatalog};
use crate::domain::embed::{build_embed_url, EmbedConfig};
use crate::domain::export::{export_report, ExportEvent, ExportState, ExportedFile, PollPolicy, StatusTone};
use crate::domain::reports::ReportContext;
use crate::infra::powerbi_api::PowerBiApi;
use crate::infra::settings::AppSettings;
use crate::shared::error::{AppError, AppResult};
use crate::shared::error_code::ErrorCode;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::{now_unix_seconds, Clock};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub workspace_id: String,
    pub report_id: String,
    pub use_dynamic_report_selection: bool,
    pub app_url: String,
    pub poll_policy: PollPolicy,
}

impl SessionConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            workspace_id: settings.power_bi_workspace_id.clone(),
            report_id: settings.power_bi_report_id.clone(),
            use_dynamic_report_selection: settings.use_dynamic_report_selection,
            app_url: settings.power_bi_app_url.clone(),
            poll_policy: PollPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    catalog: Option<ReportCatalog>,
    context: Option<ReportContext>,
    export: ExportState,
    token_expires_at: Option<i64>,
    /// Bumped when an embed or export begins and on every reset; events carrying an older
    /// generation are dropped.
    generation: u64,
}

impl SessionState {
    fn reset(&mut self) {
        if self.export.is_in_flight() {
            tracing::info!(state = ?self.export, "abandoning in-flight export");
        }
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    fn begin(&mut self, next: ExportState) -> u64 {
        self.export = next;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub signed_in: bool,
    pub account: Option<Account>,
    pub token_expires_in: Option<String>,
    pub dynamic_report_selection: bool,
    pub reports_loaded: bool,
    pub report_count: usize,
    pub unavailable_workspaces: usize,
    pub report_context: Option<ReportContext>,
    pub export_status: String,
    pub export_tone: StatusTone,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOutcome {
    pub config: EmbedConfig,
    pub context: ReportContext,
    pub token_expires_in: String,
}

pub struct SessionController {
    config: SessionConfig,
    tokens: TokenProvider,
    api: PowerBiApi,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(config: SessionConfig, tokens: TokenProvider, api: PowerBiApi, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            tokens,
            api,
            clock,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let account = self.tokens.active_account();
        let state = self.state.lock_or_recover();
        let now = now_unix_seconds();
        SessionSnapshot {
            signed_in: account.is_some(),
            token_expires_in: account.as_ref().and_then(|_| {
                state
                    .token_expires_at
                    .map(|exp| crate::auth::credential::format_expiry(Some(exp), now))
            }),
            account,
            dynamic_report_selection: self.config.use_dynamic_report_selection,
            reports_loaded: state.catalog.is_some(),
            report_count: state.catalog.as_ref().map_or(0, |c| c.reports.len()),
            unavailable_workspaces: state
                .catalog
                .as_ref()
                .map_or(0, |c| c.degraded_sources.len()),
            report_context: state.context.clone(),
            export_status: state.export.status_text(),
            export_tone: state.export.tone(),
        }
    }

    pub fn report_context(&self) -> Option<ReportContext> {
        self.state.lock_or_recover().context.clone()
    }

    pub fn export_state(&self) -> ExportState {
        self.state.lock_or_recover().export.clone()
    }

    pub fn cached_reports(&self) -> Option<ReportCatalog> {
        self.state.lock_or_recover().catalog.clone()
    }

    /// Interactive sign-in; loads the report list right away when dynamic selection is on.
    pub async fn sign_in(&self) -> AppResult<SessionSnapshot> {
        let credential = self
            .tokens
            .identity()
            .acquire_interactive(self.tokens.scopes())
            .await?;
        {
            let mut state = self.state.lock_or_recover();
            state.reset();
            state.token_expires_at = credential.expires_at();
        }

        if self.config.use_dynamic_report_selection {
            let catalog = discover_reports(&self.api, &credential).await;
            self.state.lock_or_recover().catalog = Some(catalog);
        }
        Ok(self.snapshot())
    }

    pub fn sign_out(&self) {
        self.tokens.identity().sign_out();
        self.state.lock_or_recover().reset();
    }

    /// Report catalog for the session; fetched once unless `force`.
    pub async fn load_reports(&self, force: bool) -> AppResult<ReportCatalog> {
        if !force {
            if let Some(catalog) = self.cached_reports() {
                return Ok(catalog);
            }
        }
        let token = self.acquire_token().await?;
        let catalog = discover_reports(&self.api, &token).await;
        self.state.lock_or_recover().catalog = Some(catalog.clone());
        Ok(catalog)
    }

    /// Embed the selected report (or the configured one) and make it the export target.
    pub async fn embed_report(&self, selected_report_id: Option<&str>) -> AppResult<EmbedOutcome> {
        let generation = {
            let mut state = self.state.lock_or_recover();
            let next = state
                .export
                .transition(&ExportEvent::EmbedRequested)
                .ok_or_else(|| busy_error(&state.export))?;
            state.context = None;
            state.begin(next)
        };

        match self.prepare_embed(selected_report_id).await {
            Ok(outcome) => {
                let mut state = self.state.lock_or_recover();
                if state.generation != generation {
                    tracing::info!(
                        report_id = %outcome.context.report_id,
                        "session changed while embedding, discarding the embed"
                    );
                    return Err(session_changed());
                }
                state.context = Some(outcome.context.clone());
                apply(&mut state.export, ExportEvent::EmbedReady);
                tracing::info!(
                    report_id = %outcome.context.report_id,
                    workspace_id = ?outcome.context.workspace_id,
                    "report embedded"
                );
                Ok(outcome)
            }
            Err(err) => {
                let mut state = self.state.lock_or_recover();
                if state.generation == generation {
                    state.context = None;
                    apply(&mut state.export, ExportEvent::EmbedFailed);
                }
                tracing::warn!("embed failed: {}", err);
                Err(err)
            }
        }
    }

    async fn prepare_embed(&self, selected_report_id: Option<&str>) -> AppResult<EmbedOutcome> {
        let token = self.acquire_token().await?;
        let (context, embed_url) = self.resolve_report(selected_report_id)?;
        Ok(EmbedOutcome {
            config: EmbedConfig::for_report(&token, &context.report_id, &embed_url),
            token_expires_in: token.expires_in_text(now_unix_seconds()),
            context,
        })
    }

    /// Selected report from the loaded list, else the configured workspace/report pair.
    fn resolve_report(&self, selected_report_id: Option<&str>) -> AppResult<(ReportContext, String)> {
        let selected = selected_report_id.map(str::trim).filter(|id| !id.is_empty());
        if self.config.use_dynamic_report_selection {
            if let Some(selected) = selected {
                let state = self.state.lock_or_recover();
                let found = state
                    .catalog
                    .as_ref()
                    .and_then(|c| c.reports.iter().find(|r| r.id == selected));
                if let Some(report) = found {
                    return Ok((
                        ReportContext::new(report.id.clone(), report.workspace_id.clone()),
                        report.embed_url.clone(),
                    ));
                }
                tracing::warn!(
                    report_id = selected,
                    "selected report is not in the loaded list, using the configured report"
                );
            }
        }

        let embed_url = build_embed_url(
            &self.config.app_url,
            &self.config.workspace_id,
            &self.config.report_id,
        )?;
        Ok((
            ReportContext::new(
                self.config.report_id.clone(),
                Some(self.config.workspace_id.clone()),
            ),
            embed_url,
        ))
    }

    /// Export target without embedding (CLI).
    pub fn select_report(&self, context: ReportContext) -> AppResult<()> {
        let mut state = self.state.lock_or_recover();
        if state.export.is_in_flight() {
            return Err(export_in_progress());
        }
        state.context = Some(context);
        Ok(())
    }

    /// Export the embedded report to PDF. One export at a time per session.
    ///
    /// Dropping the returned future before it finishes marks the export failed, so a cancelled
    /// request never leaves the session busy.
    pub async fn export_pdf(&self) -> AppResult<ExportedFile> {
        let (context, generation) = {
            let mut state = self.state.lock_or_recover();
            let context = state.context.clone().ok_or_else(|| {
                ErrorCode::ExportNoReportContext.error("Embed a report before exporting.")
            })?;
            let next = state
                .export
                .transition(&ExportEvent::Begin)
                .ok_or_else(|| busy_error(&state.export))?;
            (context, state.begin(next))
        };
        let _abandon = AbandonOnDrop {
            session: self,
            generation,
        };

        let token = match self.acquire_token().await {
            Ok(token) => token,
            Err(err) => {
                self.publish(generation, ExportEvent::from_error(&err));
                return Err(err);
            }
        };

        let file = export_report(
            &self.api,
            &token,
            &context,
            self.clock.as_ref(),
            self.config.poll_policy,
            |event| self.publish(generation, event),
        )
        .await?;

        if self.state.lock_or_recover().generation != generation {
            tracing::info!(report_id = %context.report_id, "session changed during export, discarding the file");
            return Err(session_changed());
        }
        Ok(file)
    }

    async fn acquire_token(&self) -> AppResult<Credential> {
        let token = self.tokens.acquire_token().await?;
        self.state.lock_or_recover().token_expires_at = token.expires_at();
        Ok(token)
    }

    fn publish(&self, generation: u64, event: ExportEvent) {
        let mut state = self.state.lock_or_recover();
        if state.generation != generation {
            tracing::debug!(event = ?event, "dropped event from an abandoned export");
            return;
        }
        apply(&mut state.export, event);
    }
}

/// Fails the export of `generation` if `export_pdf` is dropped while it is still in flight.
struct AbandonOnDrop<'a> {
    session: &'a SessionController,
    generation: u64,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state.lock_or_recover();
        if state.generation == self.generation && state.export.is_in_flight() {
            tracing::warn!(state = ?state.export, "export cancelled before it finished");
            apply(
                &mut state.export,
                ExportEvent::Failed {
                    phase: None,
                    message: "Export was cancelled.".to_string(),
                },
            );
        }
    }
}

fn apply(export: &mut ExportState, event: ExportEvent) {
    match export.transition(&event) {
        Some(next) => *export = next,
        None => tracing::debug!(state = ?export, event = ?event, "ignored out-of-order export event"),
    }
}

fn export_in_progress() -> AppError {
    ErrorCode::ExportInProgress.error("An export is already running for this session.")
}

fn busy_error(export: &ExportState) -> AppError {
    match export {
        ExportState::PreparingEmbed => ErrorCode::EmbedInProgress
            .error("A report is still being embedded; export once it is ready."),
        _ => export_in_progress(),
    }
}

fn session_changed() -> AppError {
    ErrorCode::SessionChanged.error("The session changed before the operation finished.")
}
