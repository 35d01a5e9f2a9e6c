//! Usage: Process entry (CLI dispatch, runtime, logging) on top of the library modules.

pub mod app_state;
pub mod cli;
pub mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::auth::identity::BrowserLauncher;
use crate::domain::reports::ReportContext;
use crate::infra::settings::AppSettings;
use crate::server::EmbedServer;
use crate::shared::error::AppResult;
use cli::{Cli, Command, ExportArgs, ServeArgs};

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    load_env_files(cli.env_file.as_deref());

    let settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let _logging = logging::init(settings.log_dir.as_deref());
    logging::install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("tokio runtime init failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        match cli.into_command() {
            Command::Serve(args) => serve(settings, args).await,
            Command::Reports => print_reports(settings).await,
            Command::Export(args) => export(settings, args).await,
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code(), "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_env_files(extra: Option<&Path>) {
    if let Some(path) = extra {
        if let Err(err) = dotenvy::from_path(path) {
            eprintln!("failed to load env file {}: {err}", path.display());
        }
    }
    // A missing `.env` is normal; real variables always win over file values.
    let _ = dotenvy::dotenv();
}

async fn serve(mut settings: AppSettings, args: ServeArgs) -> AppResult<()> {
    if let Some(host) = args.host {
        settings.listen_host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(dir) = args.public_dir {
        settings.public_dir = dir;
    }
    settings.log_missing_required_settings();
    if !settings.public_dir.join("index.html").is_file() {
        tracing::warn!(
            public_dir = %settings.public_dir.display(),
            "index.html not found in the public directory"
        );
    }

    let host = settings.listen_host.clone();
    let port = settings.port;
    let state = app_state::build_host_state(settings)?;

    let mut server = EmbedServer::default();
    let status = server.start(state, &host, port).await?;
    if let Some(base_url) = status.base_url.as_deref() {
        tracing::info!("Power BI Embedded (Org owns data) demo listening at {base_url}");
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler failed, shutting down: {}", err);
    }
    server.stop().await;
    Ok(())
}

fn terminal_launcher() -> BrowserLauncher {
    Arc::new(|url: &str| {
        eprintln!("Open this URL in a browser to sign in:\n\n  {url}\n");
    })
}

async fn print_reports(settings: AppSettings) -> AppResult<()> {
    let session = app_state::build_session(&settings, terminal_launcher())?;
    session.sign_in().await?;
    let catalog = session.load_reports(false).await?;

    if catalog.reports.is_empty() {
        println!("No reports found");
    }
    for report in &catalog.reports {
        println!("{}\t{}", report.id, report.label());
    }
    if !catalog.degraded_sources.is_empty() {
        eprintln!(
            "{} workspace(s) could not be listed: {}",
            catalog.degraded_sources.len(),
            catalog
                .degraded_sources
                .iter()
                .map(|s| s.workspace_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

async fn export(settings: AppSettings, args: ExportArgs) -> AppResult<()> {
    let session = app_state::build_session(&settings, terminal_launcher())?;
    session.sign_in().await?;

    let context = match args.report_id {
        Some(report_id) => ReportContext::new(report_id, args.workspace_id),
        None => ReportContext::new(
            settings.power_bi_report_id.clone(),
            args.workspace_id
                .or_else(|| Some(settings.power_bi_workspace_id.clone())),
        ),
    };
    session.select_report(context)?;

    let file = session.export_pdf().await?;
    let path = write_export(&args.output_dir, &file.file_name, &file.content)?;
    println!("{}", path.display());
    Ok(())
}

fn write_export(dir: &Path, file_name: &str, content: &[u8]) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("SYSTEM_ERROR: failed to create {}: {e}", dir.display()))?;
    let path = dir.join(file_name);
    std::fs::write(&path, content)
        .map_err(|e| format!("SYSTEM_ERROR: failed to write {}: {e}", path.display()))?;
    Ok(path)
}
