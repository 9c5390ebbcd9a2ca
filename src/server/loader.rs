//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use std::path::PathBuf;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Settings given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Extra config file, required to exist when given
    pub file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load configuration from files, environment, and CLI overrides
pub fn load_config(overrides: &ConfigOverrides) -> Result<AppConfig> {
    load_config_from(overrides, None)
}

/// Same as [`load_config`], reading variables from `vars` instead of the
/// process environment when given.
pub(crate) fn load_config_from(
    overrides: &ConfigOverrides,
    vars: Option<Map<String, String>>,
) -> Result<AppConfig> {
    let var = |key: &str| match &vars {
        Some(vars) => vars.get(key).cloned(),
        None => std::env::var(key).ok(),
    };
    let env_name = var("RELA_ENV").unwrap_or_else(|| "development".to_string());
    let port_var = var("PORT");

    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
        .add_source(File::with_name("config/local").required(false));

    if let Some(path) = &overrides.file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    // 3. Environment variables
    // prefix_separator("_") so RELA_SERVER__PORT maps to server.port
    builder = builder.add_source(
        Environment::with_prefix("RELA")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars.clone()),
    );

    // 4. Bare PORT, as most hosting platforms set it
    if let Some(port) = parse_port_var(port_var.as_deref())? {
        builder = builder.set_override("server.port", i64::from(port))?;
    }

    // 5. CLI flags (highest priority)
    builder = builder
        .set_override_option("server.host", overrides.host.clone())?
        .set_override_option("server.port", overrides.port.map(i64::from))?;

    let config: AppConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    config.validate()?;
    Ok(config)
}

fn parse_port_var(raw: Option<&str>) -> Result<Option<u16>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("PORT must be a valid port number, got {:?}", value)),
    }
}
