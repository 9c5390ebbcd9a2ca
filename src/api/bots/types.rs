use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rela_core::{BotId, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/create`
///
/// Fields are kept loose: a non-string `name` falls back to an empty name,
/// a non-string `token` counts as missing.
#[derive(Debug, Default, Deserialize)]
pub struct CreateBotRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub token: Option<Value>,
}

impl CreateBotRequest {
    pub fn name(&self) -> &str {
        match &self.name {
            Some(Value::String(name)) => name,
            _ => "",
        }
    }

    pub fn token(&self) -> &str {
        match &self.token {
            Some(Value::String(token)) => token,
            _ => "",
        }
    }
}

/// `{ok, botId?, error?}` envelope returned by the mutating endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<BotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BotResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            bot_id: None,
            error: None,
        }
    }

    pub fn created(bot_id: BotId) -> Self {
        Self {
            bot_id: Some(bot_id),
            ..Self::ok()
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            ok: false,
            bot_id: None,
            error,
        }
    }
}

/// Registry error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0 {
            Error::InvalidArgument(message) => (StatusCode::BAD_REQUEST, Some(message)),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, None),
            Error::StartFailed(e) | Error::StopFailed(e) | Error::SendFailed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(e.message().to_string()),
            ),
        };
        (status, Json(BotResponse::failed(error))).into_response()
    }
}
