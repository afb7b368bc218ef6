//! Error handling module for the deck data layer.
//!
//! Provides a single error type shared by the collaborator seams. Nothing here is
//! fatal to a deck: callers above the collaborators recover by omission.

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const GATEWAY_ERROR: &str = "GATEWAY_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const IMAGE_TOO_LARGE: &str = "IMAGE_TOO_LARGE";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Transport failure talking to a remote collaborator
    Network(String),
    /// A document or reply could not be decoded
    Decode(String),
    /// Requested document or blob does not exist
    NotFound(String),
    /// The recommendation API answered with a failure
    Gateway(String),
    /// Blob storage failure
    Storage(String),
    /// Blob exceeded the configured size cap
    ImageTooLarge { size: usize, limit: usize },
    /// Invalid configuration value
    Config(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Network(_) => codes::NETWORK_ERROR,
            AppError::Decode(_) => codes::DECODE_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Gateway(_) => codes::GATEWAY_ERROR,
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::ImageTooLarge { .. } => codes::IMAGE_TOO_LARGE,
            AppError::Config(_) => codes::CONFIG_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Network(msg) => msg.clone(),
            AppError::Decode(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Gateway(msg) => msg.clone(),
            AppError::Storage(msg) => msg.clone(),
            AppError::ImageTooLarge { size, limit } => {
                format!("Blob of {} bytes exceeds limit of {} bytes", size, limit)
            }
            AppError::Config(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        if err.is_decode() {
            AppError::Decode(format!("Response decode error: {}", err))
        } else {
            AppError::Network(format!("HTTP error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Decode(format!("JSON error: {}", err))
    }
}

/// Result alias used across the crate.
pub type AppResult<T> = Result<T, AppError>;
