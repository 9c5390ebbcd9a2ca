//! Rela - multi-bot control server
//!
//! CLI entry point for the Rela server.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use rela::server::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    cli::run(cli).await
}

/// Install the global subscriber. Keep the returned guard alive so the file
/// writer flushes on exit.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let prefix = path
                .file_name()
                .context("logging.file must name a file")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rela=info,rela_core=info,rela_channels=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
