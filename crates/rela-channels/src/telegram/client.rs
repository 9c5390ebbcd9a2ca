//! Telegram client core

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rela_core::util::mask_for_logging;
use rela_core::{ClientError, InboundMessage, MessageHandler, PlatformClient};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message as TelegramMessage};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Error;

/// Inbound side shared with the running dispatcher.
#[derive(Default)]
pub(crate) struct Inbound {
    handler: RwLock<Option<MessageHandler>>,
    accepting: AtomicBool,
}

impl Inbound {
    pub(crate) fn set_handler(&self, handler: MessageHandler) {
        *self.handler.write().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    pub(crate) fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Hand a text message to the registered handler.
    ///
    /// Non-text updates and anything arriving while not accepting are
    /// ignored. Returns whether the handler ran.
    pub(crate) fn deliver(&self, chat_id: ChatId, text: Option<&str>) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        let Some(text) = text else {
            return false;
        };
        let handler = self
            .handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(handler) = handler else {
            return false;
        };

        debug!(
            chat_id = %chat_id,
            text = %mask_for_logging(text),
            "Telegram message received"
        );
        handler(InboundMessage::new(chat_id.0.to_string(), text));
        true
    }
}

struct Polling {
    shutdown: ShutdownToken,
    task: JoinHandle<()>,
}

/// One Telegram bot account, long-polling for updates while started.
pub struct TelegramClient {
    bot: Bot,
    inbound: Arc<Inbound>,
    polling: Mutex<Option<Polling>>,
}

impl TelegramClient {
    /// Wrap a teloxide bot. Nothing is contacted until `start`.
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            inbound: Arc::new(Inbound::default()),
            polling: Mutex::new(None),
        }
    }

    /// Whether the update dispatcher is running
    pub async fn is_polling(&self) -> bool {
        self.polling.lock().await.is_some()
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        // A started dispatcher must not outlive its client
        if let Some(Polling { shutdown, task }) = self.polling.get_mut().take() {
            self.inbound.set_accepting(false);
            let _ = shutdown.shutdown();
            task.abort();
            debug!("Telegram client dropped while polling, dispatcher aborted");
        }
    }
}

/// Parse a chat id as sent back through `reply`
pub(crate) fn parse_chat_id(chat_id: &str) -> Result<ChatId, Error> {
    chat_id
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Parse(format!("invalid chat id: {chat_id}")))
}

#[async_trait]
impl PlatformClient for TelegramClient {
    fn on_message(&self, handler: MessageHandler) {
        self.inbound.set_handler(handler);
    }

    async fn start(&self) -> Result<(), ClientError> {
        let mut polling = self.polling.lock().await;
        if polling.is_some() {
            return Ok(());
        }

        // Reject bad tokens up front instead of inside the polling loop
        let me = self.bot.get_me().await.map_err(Error::from)?;
        info!(username = ?me.username, "Telegram bot authenticated");

        let inbound = Arc::clone(&self.inbound);
        let handler = Update::filter_message().endpoint(move |msg: TelegramMessage| {
            let inbound = Arc::clone(&inbound);
            async move {
                inbound.deliver(msg.chat.id, msg.text());
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build();
        let shutdown = dispatcher.shutdown_token();

        self.inbound.set_accepting(true);
        let task = tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        *polling = Some(Polling { shutdown, task });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ClientError> {
        let mut polling = self.polling.lock().await;
        let Some(Polling { shutdown, task }) = polling.take() else {
            return Ok(());
        };

        self.inbound.set_accepting(false);

        match shutdown.shutdown() {
            Ok(done) => done.await,
            Err(_) => {
                // Dispatcher has not begun polling yet
                debug!("Telegram dispatcher idle, aborting");
                task.abort();
            }
        }

        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Telegram dispatcher task failed");
            }
        }
        info!("Telegram polling stopped");
        Ok(())
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<(), ClientError> {
        let chat_id = parse_chat_id(chat_id)?;
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
