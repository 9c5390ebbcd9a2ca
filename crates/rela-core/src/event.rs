//! Events relayed to connected observers.

use serde::{Deserialize, Serialize};

use crate::registry::BotStatus;

/// A lifecycle or traffic fact published to observers.
///
/// Serialized as an internally tagged JSON object, e.g.
/// `{"type":"status","name":"Alpha","status":"running"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// A bot was created and started
    BotCreated {
        /// Bot display name
        name: String,
    },
    /// A bot changed status
    Status {
        /// Bot display name
        name: String,
        /// New status
        status: BotStatus,
    },
    /// A bot was removed
    Deleted {
        /// Bot display name
        name: String,
    },
    /// A bot received an inbound text message
    Message {
        /// Name of the receiving bot
        bot: String,
        /// Message text
        msg: String,
    },
}

impl BroadcastEvent {
    /// The wire tag of this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BotCreated { .. } => "bot_created",
            Self::Status { .. } => "status",
            Self::Deleted { .. } => "deleted",
            Self::Message { .. } => "message",
        }
    }
}
