//! Configuration module for the deck data layer.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use crate::errors::AppError;

/// Default number of cards kept live in a deck.
pub const DEFAULT_DECK_CAPACITY: usize = 3;

/// Default blob size cap (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the reaction/recommendation API; `None` disables the gateway
    pub api_base_url: Option<String>,
    /// Number of cards kept live in a deck
    pub deck_capacity: usize,
    /// Maximum accepted blob size in bytes
    pub max_image_bytes: usize,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Fall back to a random catalog draw when the gateway has nothing
    pub random_fallback: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Some("http://127.0.0.1:8000".to_string()),
            deck_capacity: DEFAULT_DECK_CAPACITY,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            http_timeout: Duration::from_secs(10),
            random_fallback: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let api_base_url = match env::var("GIVEO_API_BASE_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url.trim_end_matches('/').to_string()),
            Err(_) => defaults.api_base_url,
        };

        let deck_capacity = parse_var("GIVEO_DECK_CAPACITY", defaults.deck_capacity)?;
        if deck_capacity == 0 {
            return Err(AppError::Config(
                "GIVEO_DECK_CAPACITY must be at least 1".to_string(),
            ));
        }

        let max_image_bytes = parse_var("GIVEO_MAX_IMAGE_BYTES", defaults.max_image_bytes)?;
        let timeout_secs = parse_var("GIVEO_HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())?;
        let random_fallback = parse_var("GIVEO_RANDOM_FALLBACK", defaults.random_fallback)?;
        let log_level = env::var("GIVEO_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_base_url,
            deck_capacity,
            max_image_bytes,
            http_timeout: Duration::from_secs(timeout_secs),
            random_fallback,
            log_level,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {} value: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
