//! Usage: Command-line interface (serve the embed host, list reports, export a report to PDF).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "pbi-org-embed", version, about = "Power BI embed host (organization owns data) with PDF export")]
pub struct Cli {
    /// Extra `.env` file loaded before the process environment is read.
    #[arg(long, global = true, env = "PBI_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the embed page and its API (default).
    Serve(ServeArgs),
    /// Sign in and print every report the account can see.
    Reports,
    /// Sign in and export a report to PDF.
    Export(ExportArgs),
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Overrides LISTEN_ADDRESS / PORT host.
    #[arg(long)]
    pub host: Option<String>,
    /// Overrides PORT.
    #[arg(long)]
    pub port: Option<u16>,
    /// Overrides PUBLIC_DIR.
    #[arg(long)]
    pub public_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Report to export; defaults to POWER_BI_REPORT_ID.
    #[arg(long)]
    pub report_id: Option<String>,
    /// Workspace (group) of the report; omit for My Workspace when --report-id is given.
    #[arg(long)]
    pub workspace_id: Option<String>,
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["pbi-org-embed"]).expect("parse");
        assert!(matches!(cli.into_command(), Command::Serve(_)));
    }

    #[test]
    fn export_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "pbi-org-embed",
            "export",
            "--report-id",
            "r-1",
            "--workspace-id",
            "w-1",
            "--output-dir",
            "out",
        ])
        .expect("parse");
        match cli.into_command() {
            Command::Export(args) => {
                assert_eq!(args.report_id.as_deref(), Some("r-1"));
                assert_eq!(args.workspace_id.as_deref(), Some("w-1"));
                assert_eq!(args.output_dir, PathBuf::from("out"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
