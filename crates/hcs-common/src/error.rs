//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, HcsError>;

/// Main error type for configuration and support code
#[derive(Error, Debug)]
pub enum HcsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl HcsError {
    /// Configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// A required environment variable is unset or empty
    pub fn missing_var(name: &str) -> Self {
        Self::Config(format!("{} environment variable is required", name))
    }

    /// An environment variable is set but cannot be parsed
    pub fn invalid_var(name: &str, value: &str) -> Self {
        Self::Parse(format!("invalid value for {}: '{}'", name, value))
    }
}
