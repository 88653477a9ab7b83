/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_INSTRUCTIONS: &str = "You are a kiosk voice assistant. When the user orders or adjusts items, call the provided cart tools with correct ids. Keep confirmations brief.";

/// Settings for the realtime voice session client.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Endpoint returning `{ "value": <token> }`.
    pub token_endpoint: String,
    /// Realtime endpoint the SDP offer is posted to.
    pub calls_url: String,
    pub model: String,
    pub ice_servers: Vec<String>,
    /// Behavioral instructions registered alongside the tools.
    pub instructions: String,
    pub event_log_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_endpoint: "http://localhost:3000/token".to_string(),
            calls_url: "https://api.openai.com/v1/realtime/calls".to_string(),
            model: "gpt-realtime".to_string(),
            ice_servers: Vec::new(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            event_log_capacity: 200,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let token_endpoint = url_var("KIOSK_TOKEN_ENDPOINT", defaults.token_endpoint)?;
        let calls_url = url_var("REALTIME_CALLS_URL", defaults.calls_url)?;
        let model = std::env::var("REALTIME_MODEL").unwrap_or(defaults.model);
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "REALTIME_MODEL".to_string(),
                "model must not be empty".to_string(),
            ));
        }

        let ice_servers: Vec<String> = std::env::var("REALTIME_ICE_SERVERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let instructions = std::env::var("KIOSK_INSTRUCTIONS").unwrap_or(defaults.instructions);

        let event_log_capacity = match std::env::var("EVENT_LOG_CAPACITY") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "EVENT_LOG_CAPACITY".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    )
                })?,
            Err(_) => defaults.event_log_capacity,
        };

        Ok(Self {
            token_endpoint,
            calls_url,
            model,
            ice_servers,
            instructions,
            event_log_capacity,
        })
    }
}

fn url_var(name: &str, default: String) -> Result<String, ConfigError> {
    let value = std::env::var(name).unwrap_or(default);
    reqwest::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    Ok(value)
}
