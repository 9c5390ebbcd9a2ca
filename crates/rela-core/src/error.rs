//! Error types for rela-core

use thiserror::Error;

/// Failure reported by a platform client (start, stop, or send rejected).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
}

impl ClientError {
    /// Create a client error with the given message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Registry error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown bot id
    #[error("bot not found: {0}")]
    NotFound(String),

    /// The platform client refused to start
    #[error("failed to start bot: {0}")]
    StartFailed(#[source] ClientError),

    /// The platform client refused to stop
    #[error("failed to stop bot: {0}")]
    StopFailed(#[source] ClientError),

    /// A reply could not be delivered
    #[error("failed to send reply: {0}")]
    SendFailed(#[source] ClientError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StartFailed(ClientError::new("Unauthorized"));
        assert_eq!(err.to_string(), "failed to start bot: Unauthorized");

        let err = Error::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "bot not found: abc");
    }

    #[test]
    fn test_error_source_is_client_error() {
        use std::error::Error as _;

        let err = Error::StopFailed(ClientError::new("timeout"));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("timeout"));
    }
}
