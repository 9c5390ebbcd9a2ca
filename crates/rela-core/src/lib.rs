//! Rela Core - bot lifecycle and event relay
//!
//! This crate holds the concurrency-relevant core of Rela Control:
//! - `registry`: the bot registry (create, start, stop, delete, list)
//! - `hub`: the observer hub that fans events out to WebSocket clients
//! - `client`: the platform client capability each bot is bound to
//! - `event`: the events published to observers
//! - `util`: masking of message text for logs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod event;
pub mod hub;
pub mod mock;
pub mod registry;
pub mod util;

pub use client::{ClientFactory, InboundMessage, MessageHandler, PlatformClient};
pub use error::{ClientError, Error, Result};
pub use event::BroadcastEvent;
pub use hub::{EventHub, Subscription, DEFAULT_OBSERVER_BUFFER};
pub use registry::{BotId, BotRegistry, BotStatus, BotSummary, DEFAULT_REPLY_TEMPLATE};
