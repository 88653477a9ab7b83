//! HTTP side of connection setup: fetching the short-lived access token and
//! exchanging the local offer for the remote answer.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Yields the bearer token authorizing the description exchange.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<SecretString, TransportError>;
}

/// Exchanges a local offer for the remote answer.
#[async_trait]
pub trait SdpExchange: Send + Sync {
    async fn exchange(&self, token: &SecretString, offer_sdp: &str)
    -> Result<String, TransportError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    value: String,
}

/// Fetches `{ "value": <token> }` from a token endpoint with a GET request.
pub struct HttpCredentialSource {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpCredentialSource {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    #[instrument(name = "fetch_token", skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Result<SecretString, TransportError> {
        let credential_error = |e: reqwest::Error| TransportError::Credential(e.to_string());
        let token: TokenResponse = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(credential_error)?
            .error_for_status()
            .map_err(credential_error)?
            .json()
            .await
            .map_err(credential_error)?;
        if token.value.is_empty() {
            return Err(TransportError::Credential(
                "token endpoint returned an empty value".to_string(),
            ));
        }
        debug!("Token fetched");
        Ok(SecretString::from(token.value))
    }
}

/// A token obtained out of band.
pub struct StaticCredential(SecretString);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn fetch(&self) -> Result<SecretString, TransportError> {
        Ok(self.0.clone())
    }
}

/// POSTs the offer to `<calls_url>?model=<model>` as `application/sdp`.
pub struct SignalingClient {
    http: reqwest::Client,
    calls_url: String,
    model: String,
}

impl SignalingClient {
    pub fn new(http: reqwest::Client, calls_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            calls_url: calls_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SdpExchange for SignalingClient {
    #[instrument(name = "sdp_exchange", skip_all, fields(model = %self.model))]
    async fn exchange(
        &self,
        token: &SecretString,
        offer_sdp: &str,
    ) -> Result<String, TransportError> {
        let signaling_error = |e: reqwest::Error| TransportError::Signaling(e.to_string());
        let response = self
            .http
            .post(&self.calls_url)
            .query(&[("model", self.model.as_str())])
            .bearer_auth(token.expose_secret())
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(signaling_error)?;

        let status = response.status();
        let body = response.text().await.map_err(signaling_error)?;
        if !status.is_success() {
            return Err(TransportError::Signaling(format!("HTTP {status}: {body}")));
        }
        if !body.trim_start().starts_with("v=") {
            return Err(TransportError::InvalidAnswer);
        }
        debug!(len = body.len(), "Remote answer received");
        Ok(body)
    }
}
