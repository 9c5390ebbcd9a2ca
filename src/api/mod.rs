//! Web API module for Rela
//!
//! Provides REST API endpoints for:
//! - Bot lifecycle (create, list, start, stop, delete)
//! - Health checks

pub mod bots;
pub mod health;

pub use bots::bots_routes;
pub use health::health_routes;
