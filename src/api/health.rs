//! Health check endpoint
//!
//! `/health` reports the version plus bot and observer counts.

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use rela_core::BotRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub bots: usize,
    pub observers: usize,
}

async fn health(Extension(registry): Extension<Arc<BotRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bots: registry.len().await,
        observers: registry.hub().observer_count(),
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}
