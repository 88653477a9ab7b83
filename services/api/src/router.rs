//! Axum Router Configuration

use crate::{handlers, state::AppState};

use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/token", get(handlers::mint_token))
        .route("/health", get(handlers::health))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tracing::Level;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(upstream: &MockServer) -> String {
        let state = Arc::new(AppState {
            http: reqwest::Client::new(),
            config: Arc::new(Config {
                bind_address: "127.0.0.1:0".parse().unwrap(),
                openai_api_key: SecretString::from("sk-server".to_string()),
                client_secrets_url: format!("{}/client_secrets", upstream.uri()),
                model: "gpt-realtime".to_string(),
                voice: "alloy".to_string(),
                log_level: Level::INFO,
            }),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn serves_health_and_token_routes() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": "ek_xyz", "expires_at": 42 })),
            )
            .mount(&upstream)
            .await;
        let base = serve(&upstream).await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);
        assert_eq!(health.text().await.unwrap(), "ok");

        let token: Value = client
            .get(format!("{base}/token"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(token, json!({ "value": "ek_xyz", "expires_at": 42 }));
    }

    #[tokio::test]
    async fn token_route_reports_upstream_failure() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upstream)
            .await;
        let base = serve(&upstream).await;

        let response = reqwest::get(format!("{base}/token")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Failed to mint client secret");
    }
}
