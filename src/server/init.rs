//! Server initialization
//!
//! Wires the registry, hub, and Telegram client factory into the HTTP router
//! and runs it until a shutdown signal arrives.

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use rela_channels::{TelegramClientFactory, TelegramConfig};
use rela_core::{BotRegistry, ClientFactory, EventHub};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::config::AppConfig;

/// Build the registry the server runs with
pub fn build_registry(config: &AppConfig, factory: Arc<dyn ClientFactory>) -> Arc<BotRegistry> {
    let hub = Arc::new(EventHub::new(config.hub.observer_buffer));
    Arc::new(BotRegistry::new(factory, hub).with_reply_template(config.bots.reply_template.clone()))
}

/// Build the main router
///
/// `shutdown` is cancelled when the server stops; open WebSocket sessions
/// close on it.
pub fn build_app(
    registry: Arc<BotRegistry>,
    static_dir: Option<&Path>,
    shutdown: CancellationToken,
) -> Router {
    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::bots_routes())
        .merge(crate::websocket::websocket_router());

    // Static frontend, or a plain banner when there is none
    let app = match static_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            let serve_dir = ServeDir::new(dir)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(dir.join("index.html")));
            app.fallback_service(serve_dir)
        }
        None => app.route("/", get(|| async { "Rela Control" })),
    };

    app.layer(Extension(registry))
        .layer(Extension(shutdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server until Ctrl+C / SIGTERM
pub async fn run(config: AppConfig) -> Result<()> {
    let telegram = TelegramConfig {
        api_url: config.telegram.api_url.clone(),
    };
    let factory =
        TelegramClientFactory::new(&telegram).context("Invalid Telegram configuration")?;
    let registry = build_registry(&config, Arc::new(factory));

    let shutdown = CancellationToken::new();
    let app = build_app(
        Arc::clone(&registry),
        Some(config.server.static_dir.as_path()),
        shutdown.clone(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on http://{}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            signal.cancel();
        })
        .await
        .context("HTTP server error")?;

    info!("Stopping bots...");
    registry.shutdown().await;

    info!("Rela shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
