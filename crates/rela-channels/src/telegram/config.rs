//! Telegram configuration types

use crate::error::{Error, Result};

/// Telegram client configuration shared by every bot
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    /// Bot API base URL override (self-hosted Bot API server, test doubles)
    pub api_url: Option<String>,
}

impl TelegramConfig {
    /// Configuration using the public Bot API
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Bot API base URL
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Parse the API URL override, if any
    pub fn parsed_api_url(&self) -> Result<Option<reqwest::Url>> {
        self.api_url
            .as_deref()
            .map(|raw| {
                reqwest::Url::parse(raw.trim())
                    .map_err(|e| Error::Parse(format!("invalid Telegram API url {raw:?}: {e}")))
            })
            .transpose()
    }
}
