use secrecy::SecretString;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Server-side key used to mint client secrets. Never sent to clients.
    pub openai_api_key: SecretString,
    pub client_secrets_url: String,
    pub model: String,
    pub voice: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let client_secrets_url = std::env::var("CLIENT_SECRETS_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/realtime/client_secrets".to_string());
        reqwest::Url::parse(&client_secrets_url).map_err(|e| {
            ConfigError::InvalidValue("CLIENT_SECRETS_URL".to_string(), e.to_string())
        })?;

        let model = std::env::var("REALTIME_MODEL").unwrap_or_else(|_| "gpt-realtime".to_string());
        let voice = std::env::var("REALTIME_VOICE").unwrap_or_else(|_| "alloy".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            client_secrets_url,
            model,
            voice,
            log_level,
        })
    }
}
