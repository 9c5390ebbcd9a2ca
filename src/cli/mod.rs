//! CLI module for Rela
//!
//! - `serve`: run the server (default)
//! - `check-config`: load and validate configuration, print the result

use anyhow::Result;
use clap::{Parser, Subcommand};
use rela::server::{self, ConfigOverrides};
use std::path::PathBuf;
use tracing::info;

/// Rela Control CLI
#[derive(Parser, Debug)]
#[command(name = "rela")]
#[command(about = "Multi-bot control server with a real-time event relay")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Additional configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bind address (overrides server.host)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Listen port (overrides server.port and PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Validate configuration and print the effective settings
    CheckConfig,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            file: self.config.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let config = server::load_config(&cli.overrides())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::CheckConfig => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Serve => {
            let _log_guard = crate::init_tracing(&config.logging)?;
            info!("Starting Rela Control v{}", env!("CARGO_PKG_VERSION"));
            server::run(config).await
        }
    }
}
