//! Bots API endpoints
//!
//! POST   /api/create            - Create and start a bot
//! GET    /api/bots              - List bots
//! GET    /api/bots/:id          - Get one bot
//! POST   /api/bots/:id/start    - Start a bot
//! POST   /api/bots/:id/stop     - Stop a bot
//! DELETE /api/bots/:id          - Stop and remove a bot

pub mod handlers;
pub mod types;


pub use handlers::{create_bot, delete_bot, get_bot, list_bots, start_bot, stop_bot};
pub use types::{ApiError, BotResponse, CreateBotRequest};

use axum::{
    routing::{get, post},
    Router,
};

/// Create bots routes
pub fn bots_routes() -> Router {
    Router::new()
        .route("/api/create", post(create_bot))
        .route("/api/bots", get(list_bots))
        .route("/api/bots/:id", get(get_bot).delete(delete_bot))
        .route("/api/bots/:id/start", post(start_bot))
        .route("/api/bots/:id/stop", post(stop_bot))
}
