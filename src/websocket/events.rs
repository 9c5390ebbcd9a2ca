//! Events WebSocket handler
//!
//! Streams every published bot event to the connected client as a JSON text
//! frame. Client frames are ignored apart from Ping and Close.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use rela_core::{BotRegistry, EventHub, Subscription};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// WebSocket upgrade handler
pub async fn events_handler(
    ws: WebSocketUpgrade,
    Extension(registry): Extension<Arc<BotRegistry>>,
    Extension(shutdown): Extension<CancellationToken>,
) -> impl IntoResponse {
    // Register before the upgrade response goes out, so anything published
    // after the client sees the handshake reaches it.
    let observer = Observer::register(Arc::clone(registry.hub()));
    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, observer, shutdown))
}

/// A hub registration that is removed when dropped, including when the
/// upgrade never completes.
struct Observer {
    hub: Arc<EventHub>,
    subscription: Subscription,
}

impl Observer {
    fn register(hub: Arc<EventHub>) -> Self {
        let subscription = hub.register();
        Self { hub, subscription }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.hub.unregister(self.subscription.id());
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, mut observer: Observer, shutdown: CancellationToken) {
    let id = observer.subscription.id();
    info!("WebSocket events connection established: {}", id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = observer.subscription.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                if sender.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error on {}: {}", id, e);
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    drop(observer);
    info!("WebSocket events connection ended: {}", id);
}
