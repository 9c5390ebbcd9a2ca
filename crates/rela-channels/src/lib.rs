//! Rela Channels - platform clients
//!
//! This crate provides the messaging platform clients bots are bound to:
//! - Telegram (via teloxide)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod telegram;

pub use error::{Error, Result};

// Re-export Telegram client
pub use telegram::{TelegramClient, TelegramClientFactory, TelegramConfig};
