//! Server module for Rela
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `init`: Router assembly and the main run loop

pub mod config;
mod init;
mod loader;

// Re-export public API
pub use init::{build_app, build_registry, run, wait_for_shutdown_signal};
pub use loader::{load_config, ConfigOverrides, DEFAULT_CONFIG};
