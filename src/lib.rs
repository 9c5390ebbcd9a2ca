//! Rela - multi-bot control server
//!
//! HTTP API for managing Telegram bots plus a WebSocket feed of their
//! lifecycle and message events.

#![forbid(unsafe_code)]

pub mod api;
pub mod server;
pub mod websocket;
