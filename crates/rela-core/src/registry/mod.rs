//! BotRegistry - authoritative store of bot instances.
//!
//! Lifecycle operations on one bot (`start`, `stop`, `delete`, inbound
//! handling) are serialized by that bot's lifecycle mutex; operations on
//! different bots never wait on each other. The id map lock is only held for
//! lookups, inserts, removals, and `list` snapshots, never across a client
//! call.
//!
//! Every per-bot event is published while the bot's lifecycle mutex is held,
//! so observers see one bot's events in the order its operations ran.

mod types;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::client::{ClientFactory, InboundMessage, MessageHandler};
use crate::error::{Error, Result};
use crate::event::BroadcastEvent;
use crate::hub::EventHub;
use crate::util::mask_for_logging;

use types::{render_reply, BotEntry, Phase};
pub use types::{BotId, BotStatus, BotSummary};

/// Default reply sent for every inbound message
pub const DEFAULT_REPLY_TEMPLATE: &str = "Hello, I am {name}! You wrote: {message}";

/// Registry of bot instances keyed by id.
pub struct BotRegistry {
    bots: RwLock<HashMap<BotId, Arc<BotEntry>>>,
    factory: Arc<dyn ClientFactory>,
    hub: Arc<EventHub>,
    reply_template: Arc<str>,
    next_seq: AtomicU64,
}

impl BotRegistry {
    /// Create an empty registry that builds clients with `factory` and
    /// publishes to `hub`.
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>, hub: Arc<EventHub>) -> Self {
        Self {
            bots: RwLock::new(HashMap::new()),
            factory,
            hub,
            reply_template: DEFAULT_REPLY_TEMPLATE.into(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Set the reply template (`{name}` and `{message}` placeholders)
    #[must_use]
    pub fn with_reply_template(mut self, template: impl Into<String>) -> Self {
        self.reply_template = template.into().into();
        self
    }

    /// The hub this registry publishes to
    #[must_use]
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Create and start a bot. Nothing is recorded unless the client starts.
    #[instrument(skip(self, token))]
    pub async fn create(&self, name: &str, token: &str) -> Result<BotId> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidArgument("token is required".to_string()));
        }

        let client = self.factory.build(token).map_err(Error::StartFailed)?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let handler: MessageHandler = Arc::new(move |message: InboundMessage| {
            // Receiver gone means the bot was deleted; nothing to do.
            let _ = inbox_tx.send(message);
        });
        client.on_message(handler);

        if let Err(e) = client.start().await {
            warn!(error = %e, "Bot client failed to start");
            return Err(Error::StartFailed(e));
        }

        let id = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(BotEntry::new(id, name.to_string(), seq, client));

        {
            let _lifecycle = entry.lifecycle.lock().await;
            self.bots.write().await.insert(id, Arc::clone(&entry));
            self.hub.publish(&BroadcastEvent::BotCreated {
                name: entry.name.clone(),
            });
        }

        tokio::spawn(run_inbox(
            Arc::downgrade(&entry),
            inbox_rx,
            Arc::clone(&self.hub),
            Arc::clone(&self.reply_template),
        ));

        info!(bot_id = %id, "Bot created");
        Ok(id)
    }

    /// Snapshot of all bots, in creation order.
    pub async fn list(&self) -> Vec<BotSummary> {
        let bots = self.bots.read().await;
        let mut rows: Vec<(u64, BotSummary)> = bots
            .values()
            .filter_map(|entry| entry.summary().map(|s| (entry.seq, s)))
            .collect();
        drop(bots);

        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, summary)| summary).collect()
    }

    /// Look up one bot.
    pub async fn get(&self, id: BotId) -> Result<BotSummary> {
        self.entry(id)
            .await?
            .summary()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Start a stopped bot. Starting a running bot is a no-op.
    #[instrument(skip(self))]
    pub async fn start(&self, id: BotId) -> Result<()> {
        let entry = self.entry(id).await?;
        let _lifecycle = entry.lifecycle.lock().await;

        match entry.phase.get() {
            Phase::Removed => return Err(Error::NotFound(id.to_string())),
            Phase::Running => {
                debug!("Bot already running");
                return Ok(());
            }
            Phase::Stopped => {}
        }

        if let Err(e) = entry.client.start().await {
            warn!(error = %e, "Bot client failed to start");
            return Err(Error::StartFailed(e));
        }

        entry.phase.set(Phase::Running);
        self.hub.publish(&BroadcastEvent::Status {
            name: entry.name.clone(),
            status: BotStatus::Running,
        });
        info!("Bot started");
        Ok(())
    }

    /// Stop a running bot. Stopping a stopped bot is a no-op.
    ///
    /// When this returns `Ok`, the bot's inbound handler will not run again
    /// until the next `start`.
    #[instrument(skip(self))]
    pub async fn stop(&self, id: BotId) -> Result<()> {
        let entry = self.entry(id).await?;
        let _lifecycle = entry.lifecycle.lock().await;

        match entry.phase.get() {
            Phase::Removed => return Err(Error::NotFound(id.to_string())),
            Phase::Stopped => {
                debug!("Bot already stopped");
                return Ok(());
            }
            Phase::Running => {}
        }

        if let Err(e) = entry.client.stop().await {
            warn!(error = %e, "Bot client failed to stop");
            return Err(Error::StopFailed(e));
        }

        entry.phase.set(Phase::Stopped);
        self.hub.publish(&BroadcastEvent::Status {
            name: entry.name.clone(),
            status: BotStatus::Stopped,
        });
        info!("Bot stopped");
        Ok(())
    }

    /// Stop (if running) and remove a bot. The id is invalid afterwards.
    ///
    /// A client that fails to stop does not keep the record alive; the
    /// failure is logged and the bot is removed anyway.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: BotId) -> Result<()> {
        let entry = self.entry(id).await?;
        let _lifecycle = entry.lifecycle.lock().await;

        match entry.phase.get() {
            Phase::Removed => return Err(Error::NotFound(id.to_string())),
            Phase::Running => {
                if let Err(e) = entry.client.stop().await {
                    warn!(error = %e, "Bot client failed to stop, removing anyway");
                }
            }
            Phase::Stopped => {}
        }

        entry.phase.set(Phase::Removed);
        self.bots.write().await.remove(&id);
        self.hub.publish(&BroadcastEvent::Deleted {
            name: entry.name.clone(),
        });
        info!("Bot deleted");
        Ok(())
    }

    /// Number of registered bots
    pub async fn len(&self) -> usize {
        self.bots.read().await.len()
    }

    /// Whether no bots are registered
    pub async fn is_empty(&self) -> bool {
        self.bots.read().await.is_empty()
    }

    /// Stop every running client. Used on process exit; publishes nothing.
    pub async fn shutdown(&self) {
        let entries: Vec<Arc<BotEntry>> = self.bots.read().await.values().cloned().collect();

        for entry in entries {
            let _lifecycle = entry.lifecycle.lock().await;
            if entry.phase.get() != Phase::Running {
                continue;
            }
            match entry.client.stop().await {
                Ok(()) => entry.phase.set(Phase::Stopped),
                Err(e) => warn!(bot_id = %entry.id, error = %e, "Failed to stop bot during shutdown"),
            }
        }
        info!("All bots stopped");
    }

    async fn entry(&self, id: BotId) -> Result<Arc<BotEntry>> {
        self.bots
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// Drain one bot's inbound queue, one message at a time.
///
/// Exits once the bot record is gone (the client, and with it the queue's
/// sender, is dropped together with the record).
async fn run_inbox(
    bot: Weak<BotEntry>,
    mut inbox: mpsc::UnboundedReceiver<InboundMessage>,
    hub: Arc<EventHub>,
    template: Arc<str>,
) {
    while let Some(message) = inbox.recv().await {
        let Some(entry) = bot.upgrade() else {
            break;
        };

        {
            let _lifecycle = entry.lifecycle.lock().await;
            if entry.phase.get() != Phase::Running {
                debug!(bot_id = %entry.id, "Bot not running, inbound message dropped");
                continue;
            }
            debug!(
                bot_id = %entry.id,
                chat_id = %message.chat_id,
                text = %mask_for_logging(&message.text),
                "Inbound message"
            );
            hub.publish(&BroadcastEvent::Message {
                bot: entry.name.clone(),
                msg: message.text.clone(),
            });
        }

        let reply = render_reply(&template, &entry.name, &message.text);
        if let Err(e) = entry.client.reply(&message.chat_id, &reply).await {
            let err = Error::SendFailed(e);
            warn!(bot_id = %entry.id, chat_id = %message.chat_id, error = %err, "Reply not delivered");
        }
    }
    debug!("Inbound worker finished");
}
