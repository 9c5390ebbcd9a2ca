//! Scripted platform client for testing
//!
//! `ScriptedClient` never touches the network. Tests push inbound messages
//! with [`ScriptedClient::deliver`] and inspect replies and call counts.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{ClientFactory, InboundMessage, MessageHandler, PlatformClient};
use crate::error::ClientError;

#[derive(Default)]
struct ScriptState {
    handler: Option<MessageHandler>,
    started: bool,
    start_calls: usize,
    stop_calls: usize,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    fail_reply: Option<String>,
    replies: Vec<(String, String)>,
}

/// A platform client driven entirely by the test.
///
/// Clones share state, so a test can keep one handle while the registry owns
/// another.
#[derive(Clone)]
pub struct ScriptedClient {
    token: Arc<str>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedClient {
    /// Create a client for the given token
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.into(),
            state: Arc::default(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScriptState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Token this client was built with
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Make every following `start` fail with `message` (`None` clears it)
    pub fn fail_start(&self, message: Option<&str>) {
        self.with_state(|s| s.fail_start = message.map(str::to_string));
    }

    /// Make every following `stop` fail with `message` (`None` clears it)
    pub fn fail_stop(&self, message: Option<&str>) {
        self.with_state(|s| s.fail_stop = message.map(str::to_string));
    }

    /// Make every following `reply` fail with `message` (`None` clears it)
    pub fn fail_reply(&self, message: Option<&str>) {
        self.with_state(|s| s.fail_reply = message.map(str::to_string));
    }

    /// Simulate an inbound message. Dropped unless the client is started.
    ///
    /// Returns whether the handler was invoked.
    pub fn deliver(&self, chat_id: &str, text: &str) -> bool {
        let handler = self.with_state(|s| if s.started { s.handler.clone() } else { None });
        match handler {
            Some(handler) => {
                handler(InboundMessage::new(chat_id, text));
                true
            }
            None => false,
        }
    }

    /// Whether the client is currently started
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.with_state(|s| s.started)
    }

    /// Number of `start` calls so far, failed ones included
    #[must_use]
    pub fn start_calls(&self) -> usize {
        self.with_state(|s| s.start_calls)
    }

    /// Number of `stop` calls so far, failed ones included
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.with_state(|s| s.stop_calls)
    }

    /// Replies sent so far, as `(chat_id, text)`
    #[must_use]
    pub fn replies(&self) -> Vec<(String, String)> {
        self.with_state(|s| s.replies.clone())
    }
}

#[async_trait]
impl PlatformClient for ScriptedClient {
    fn on_message(&self, handler: MessageHandler) {
        self.with_state(|s| s.handler = Some(handler));
    }

    async fn start(&self) -> Result<(), ClientError> {
        self.with_state(|s| {
            s.start_calls += 1;
            if let Some(message) = &s.fail_start {
                return Err(ClientError::new(message.clone()));
            }
            s.started = true;
            Ok(())
        })
    }

    async fn stop(&self) -> Result<(), ClientError> {
        self.with_state(|s| {
            s.stop_calls += 1;
            if let Some(message) = &s.fail_stop {
                return Err(ClientError::new(message.clone()));
            }
            s.started = false;
            Ok(())
        })
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<(), ClientError> {
        self.with_state(|s| {
            if let Some(message) = &s.fail_reply {
                return Err(ClientError::new(message.clone()));
            }
            s.replies.push((chat_id.to_string(), text.to_string()));
            Ok(())
        })
    }
}

/// Factory producing [`ScriptedClient`]s and remembering each one.
#[derive(Clone, Default)]
pub struct ScriptedClientFactory {
    built: Arc<Mutex<Vec<ScriptedClient>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedClientFactory {
    /// Create a factory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients built for `token` will fail to start with "Unauthorized"
    pub fn reject_token(&self, token: &str) {
        self.rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.to_string());
    }

    /// The most recently built client
    #[must_use]
    pub fn last_client(&self) -> Option<ScriptedClient> {
        self.built
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// The most recently built client for `token`
    #[must_use]
    pub fn client_for(&self, token: &str) -> Option<ScriptedClient> {
        self.built
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|c| c.token() == token)
            .cloned()
    }

    /// Number of clients built so far
    #[must_use]
    pub fn built_count(&self) -> usize {
        self.built.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ClientFactory for ScriptedClientFactory {
    fn build(&self, token: &str) -> Result<Box<dyn PlatformClient>, ClientError> {
        let client = ScriptedClient::new(token);
        let rejected = self
            .rejected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(token);
        if rejected {
            client.fail_start(Some("Unauthorized"));
        }
        self.built
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(client.clone());
        Ok(Box::new(client))
    }
}
