//! Configuration errors

use thiserror::Error;

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Failed to write config {path}: {message}")]
    Write { path: String, message: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "CCS_CONFIG_NOT_FOUND",
            ConfigError::Read { .. } => "CCS_CONFIG_READ_FAILED",
            ConfigError::Parse(_) => "CCS_CONFIG_PARSE_FAILED",
            ConfigError::Write { .. } => "CCS_CONFIG_WRITE_FAILED",
            ConfigError::Invalid(_) => "CCS_CONFIG_INVALID",
        }
    }
}
