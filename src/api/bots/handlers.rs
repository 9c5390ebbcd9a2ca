use axum::{extract::Path, Extension, Json};
use rela_core::{BotId, BotRegistry, BotSummary, Error};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::types::{ApiError, BotResponse, CreateBotRequest};

/// Ids that do not parse are reported the same way as unknown ones
fn parse_id(raw: &str) -> Result<BotId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError(Error::NotFound(raw.to_string())))
}

/// Create and start a bot
pub async fn create_bot(
    Extension(registry): Extension<Arc<BotRegistry>>,
    Json(request): Json<CreateBotRequest>,
) -> Result<Json<BotResponse>, ApiError> {
    let id = registry.create(request.name(), request.token()).await?;
    info!(bot_id = %id, name = %request.name(), "Bot created via API");
    Ok(Json(BotResponse::created(id)))
}

/// List all bots in creation order
pub async fn list_bots(
    Extension(registry): Extension<Arc<BotRegistry>>,
) -> Json<Vec<BotSummary>> {
    Json(registry.list().await)
}

/// Get one bot
pub async fn get_bot(
    Extension(registry): Extension<Arc<BotRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<BotSummary>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(registry.get(id).await?))
}

/// Start a stopped bot
pub async fn start_bot(
    Extension(registry): Extension<Arc<BotRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<BotResponse>, ApiError> {
    registry.start(parse_id(&id)?).await?;
    Ok(Json(BotResponse::ok()))
}

/// Stop a running bot
pub async fn stop_bot(
    Extension(registry): Extension<Arc<BotRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<BotResponse>, ApiError> {
    registry.stop(parse_id(&id)?).await?;
    Ok(Json(BotResponse::ok()))
}

/// Stop and remove a bot
pub async fn delete_bot(
    Extension(registry): Extension<Arc<BotRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<BotResponse>, ApiError> {
    registry.delete(parse_id(&id)?).await?;
    Ok(Json(BotResponse::ok()))
}
