//! Server configuration types

use anyhow::{bail, Context, Result};
use rela_core::{DEFAULT_OBSERVER_BUFFER, DEFAULT_REPLY_TEMPLATE};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub bots: BotsConfig,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.hub.observer_buffer == 0 {
            bail!("hub.observer_buffer must be greater than 0");
        }
        if self.bots.reply_template.trim().is_empty() {
            bail!("bots.reply_template must not be empty");
        }
        if self.server.host.trim().is_empty() {
            bail!("server.host must not be empty");
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Render as TOML (for `check-config`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Static asset directory served as the router fallback
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid server address {}:{}", self.host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: default_static_dir(),
        }
    }
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

/// Observer hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            observer_buffer: default_observer_buffer(),
        }
    }
}

fn default_observer_buffer() -> usize {
    DEFAULT_OBSERVER_BUFFER
}

/// Bot behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotsConfig {
    /// Reply sent for every inbound message; `{name}` and `{message}` are substituted
    #[serde(default = "default_reply_template")]
    pub reply_template: String,
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            reply_template: default_reply_template(),
        }
    }
}

fn default_reply_template() -> String {
    DEFAULT_REPLY_TEMPLATE.to_string()
}

/// Telegram client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot API base URL override
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Log output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to this file, rolled daily
    #[serde(default)]
    pub file: Option<PathBuf>,
}
