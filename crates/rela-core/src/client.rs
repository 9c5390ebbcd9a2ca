//! Platform client capability
//!
//! A bot is bound to exactly one platform client (e.g. a Telegram bot
//! account). The registry only needs four things from it: register an
//! inbound handler, start, stop, and reply.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;

/// An inbound text message delivered by a platform client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform chat identifier the reply goes back to
    pub chat_id: String,
    /// Message text
    pub text: String,
}

impl InboundMessage {
    /// Create a new inbound message
    #[must_use]
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

/// Callback invoked by a platform client for every inbound text message.
pub type MessageHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

/// Live connection to a messaging platform for one bot account.
///
/// Implementations must guarantee that once `stop` returns, the registered
/// handler is not invoked again until the next successful `start`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Register the inbound message handler (replaces any previous one)
    fn on_message(&self, handler: MessageHandler);

    /// Connect and begin delivering inbound messages
    async fn start(&self) -> Result<(), ClientError>;

    /// Stop delivering inbound messages
    async fn stop(&self) -> Result<(), ClientError>;

    /// Send a text reply to a chat
    async fn reply(&self, chat_id: &str, text: &str) -> Result<(), ClientError>;
}

/// Constructs platform clients from account credentials.
pub trait ClientFactory: Send + Sync {
    /// Build an unstarted client for the given token
    fn build(&self, token: &str) -> Result<Box<dyn PlatformClient>, ClientError>;
}
