//! Usage: Process-wide tracing setup (stderr + optional daily log file) and the panic hook.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "pbi-org-embed.log";

/// Keeps the file writer flushing; drop it only at process exit.
#[must_use]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` controls the filter (default `info`). With `log_dir`, records are also written to a
/// daily-rotated file there.
pub fn init(log_dir: Option<&Path>) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(err) => {
                eprintln!("log dir {} unavailable, logging to stderr only: {err}", dir.display());
                (None, None)
            }
        },
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer);

    // Both fail only when a global logger is already installed (tests, embedding callers).
    let _ = tracing_log::LogTracer::init();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    if let Some(dir) = log_dir.filter(|_| file_guard.is_some()) {
        tracing::info!(log_dir = %dir.display(), "file logging enabled");
    }

    LoggingGuard { _file: file_guard }
}

/// Log panics with their location only; payloads may contain tokens.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(
            location = %location,
            "PANIC: application panicked at {location}. Check the log for context leading up to it."
        );
    }));
}
