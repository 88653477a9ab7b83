//! Axum Handlers for the token service.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::{
    models::{ClientSecret, ErrorResponse},
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("Upstream returned HTTP {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },
    #[error("Upstream returned an empty client secret")]
    EmptySecret,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Failed to mint client secret: {}", self);
        let message = "Failed to mint client secret".to_string();
        (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
    }
}

/// Mint a short-lived realtime client secret for the kiosk front-end.
#[instrument(name = "mint_token", skip_all)]
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClientSecret>, ApiError> {
    let config = &state.config;
    let body = json!({
        "session": {
            "type": "realtime",
            "model": config.model,
            "audio": { "output": { "voice": config.voice } },
        }
    });

    let response = state
        .http
        .post(&config.client_secrets_url)
        .bearer_auth(config.openai_api_key.expose_secret())
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::UpstreamStatus {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        });
    }

    let secret: ClientSecret = response.json().await?;
    if secret.value.is_empty() {
        return Err(ApiError::EmptySecret);
    }
    info!(model = %config.model, expires_at = ?secret.expires_at, "Client secret minted");
    Ok(Json(secret))
}

pub async fn health() -> &'static str {
    "ok"
}
