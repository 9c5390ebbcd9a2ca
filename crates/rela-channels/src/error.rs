//! Error types for rela-channels

use rela_core::ClientError;
use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Telegram API error
    #[error("telegram error: {0}")]
    Telegram(String),

    /// Malformed input (chat id, API url)
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<teloxide::RequestError> for Error {
    fn from(e: teloxide::RequestError) -> Self {
        Self::Telegram(e.to_string())
    }
}

impl From<Error> for ClientError {
    fn from(e: Error) -> Self {
        ClientError::new(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
