//! Application configuration

use std::env;
use std::time::Duration;

/// Default port, matching what the web client expects out of the box
const DEFAULT_PORT: &str = "3001";

/// Origins of the local development frontends
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:5176";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_origins: Vec<String>,

    // Logging
    pub log_format: LogFormat,

    // WebSocket
    pub ws_max_message_bytes: usize,

    // External presence store (optional)
    pub presence_webhook_url: Option<String>,
    pub presence_webhook_timeout_ms: u64,
    pub presence_webhook_max_retries: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(addr) => addr,
            Err(_) => {
                let port = env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
                if port.parse::<u16>().is_err() {
                    return Err(ConfigError::Invalid("PORT", port));
                }
                format!("0.0.0.0:{}", port)
            }
        };

        let mut cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Ok(frontend_url) = env::var("FRONTEND_URL") {
            let frontend_url = frontend_url.trim().to_string();
            if !frontend_url.is_empty() && !cors_origins.contains(&frontend_url) {
                cors_origins.push(frontend_url);
            }
        }

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "pretty".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => return Err(ConfigError::Invalid("LOG_FORMAT", other.to_string())),
        };

        Ok(Self {
            bind_address,
            cors_origins,
            log_format,

            ws_max_message_bytes: parse_var("WS_MAX_MESSAGE_BYTES", 1_048_576)?, // 1MB default

            presence_webhook_url: env::var("PRESENCE_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            presence_webhook_timeout_ms: parse_var("PRESENCE_WEBHOOK_TIMEOUT_MS", 2000)?,
            presence_webhook_max_retries: parse_var("PRESENCE_WEBHOOK_MAX_RETRIES", 3)?,
        })
    }

    /// Timeout for a single presence webhook request
    pub fn presence_webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.presence_webhook_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            cors_origins: DEFAULT_CORS_ORIGINS.split(',').map(str::to_string).collect(),
            log_format: LogFormat::Pretty,
            ws_max_message_bytes: 1_048_576,
            presence_webhook_url: None,
            presence_webhook_timeout_ms: 2000,
            presence_webhook_max_retries: 3,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1:?}")]
    Invalid(&'static str, String),
}
