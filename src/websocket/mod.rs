//! WebSocket module for Rela
//!
//! Provides the real-time endpoint:
//! - /ws - Bot event stream

pub mod events;

pub use events::events_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws", get(events_handler))
}
