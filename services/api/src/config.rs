use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
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
    /// Credential collaborator: returns `{ client_secret: { value } }`.
    pub session_endpoint: String,
    /// Upstream realtime WebSocket URL (model selection via query string).
    pub realtime_url: String,
    pub voice: String,
    pub prompts_path: PathBuf,
    pub prefs_path: PathBuf,
    /// Bound on credential fetch and transport negotiation. A hung connect
    /// fails fast and reverts the session to disconnected.
    pub connect_timeout: Duration,
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

        let session_endpoint = std::env::var("SESSION_ENDPOINT")
            .map_err(|_| ConfigError::MissingVar("SESSION_ENDPOINT".to_string()))?;

        let realtime_url = std::env::var("REALTIME_URL").unwrap_or_else(|_| {
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17".to_string()
        });
        if !realtime_url.starts_with("ws://") && !realtime_url.starts_with("wss://") {
            return Err(ConfigError::InvalidValue(
                "REALTIME_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", realtime_url),
            ));
        }

        let voice = std::env::var("VOICE").unwrap_or_else(|_| "coral".to_string());

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let prefs_path = std::env::var("PREFS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prefs.json"));

        let timeout_str =
            std::env::var("CONNECT_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string());
        let connect_timeout = timeout_str
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "CONNECT_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a number of seconds", timeout_str),
                )
            })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            session_endpoint,
            realtime_url,
            voice,
            prompts_path,
            prefs_path,
            connect_timeout,
            log_level,
        })
    }
}
