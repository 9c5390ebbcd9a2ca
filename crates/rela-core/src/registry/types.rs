use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::PlatformClient;

/// Bot identifier
pub type BotId = Uuid;

/// Externally visible bot status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Client started, inbound messages are handled
    Running,
    /// Client stopped, no inbound messages are delivered
    Stopped,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of one bot, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSummary {
    /// Bot identifier
    pub id: BotId,
    /// Display name
    pub name: String,
    /// Current status
    pub status: BotStatus,
}

/// Internal lifecycle phase. `Removed` marks a record that a concurrent
/// `delete` has already taken out of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running = 0,
    Stopped = 1,
    Removed = 2,
}

impl Phase {
    pub(crate) fn status(self) -> Option<BotStatus> {
        match self {
            Self::Running => Some(BotStatus::Running),
            Self::Stopped => Some(BotStatus::Stopped),
            Self::Removed => None,
        }
    }
}

/// Phase readable without taking the lifecycle lock.
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn new(phase: Phase) -> Self {
        Self(AtomicU8::new(phase as u8))
    }

    pub(crate) fn get(&self) -> Phase {
        match self.0.load(Ordering::SeqCst) {
            0 => Phase::Running,
            1 => Phase::Stopped,
            _ => Phase::Removed,
        }
    }

    pub(crate) fn set(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::SeqCst);
    }
}

/// One bot record. Owns the platform client.
pub(crate) struct BotEntry {
    pub(crate) id: BotId,
    pub(crate) name: String,
    /// Creation order, used to keep `list` stable
    pub(crate) seq: u64,
    pub(crate) phase: PhaseCell,
    /// Serializes start/stop/delete and inbound handling for this bot
    pub(crate) lifecycle: Mutex<()>,
    pub(crate) client: Box<dyn PlatformClient>,
}

impl BotEntry {
    pub(crate) fn new(id: BotId, name: String, seq: u64, client: Box<dyn PlatformClient>) -> Self {
        Self {
            id,
            name,
            seq,
            phase: PhaseCell::new(Phase::Running),
            lifecycle: Mutex::new(()),
            client,
        }
    }

    pub(crate) fn summary(&self) -> Option<BotSummary> {
        self.phase.get().status().map(|status| BotSummary {
            id: self.id,
            name: self.name.clone(),
            status,
        })
    }
}

/// Fill a reply template. `{name}` becomes the bot name, `{message}` the inbound text.
pub(crate) fn render_reply(template: &str, name: &str, message: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len() + message.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{name}") {
            out.push_str(name);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{message}") {
            out.push_str(message);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
