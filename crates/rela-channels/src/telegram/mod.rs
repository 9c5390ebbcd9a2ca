//! Telegram - teloxide client
//!
//! Each bot owns one [`TelegramClient`]; [`TelegramClientFactory`] builds
//! them from bot tokens for the registry.

mod client;
mod config;


pub use client::TelegramClient;
pub use config::TelegramConfig;

use rela_core::{ClientError, ClientFactory, PlatformClient};
use teloxide::Bot;

use crate::error::Result;

/// Builds [`TelegramClient`]s sharing one HTTP connection pool.
pub struct TelegramClientFactory {
    http: reqwest::Client,
    api_url: Option<reqwest::Url>,
}

impl TelegramClientFactory {
    /// Create a factory. Fails if the configured API url is malformed.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        Ok(Self {
            http: teloxide::net::client_from_env(),
            api_url: config.parsed_api_url()?,
        })
    }
}

impl ClientFactory for TelegramClientFactory {
    fn build(&self, token: &str) -> std::result::Result<Box<dyn PlatformClient>, ClientError> {
        let bot = Bot::with_client(token, self.http.clone());
        let bot = match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        };
        Ok(Box::new(TelegramClient::new(bot)))
    }
}
