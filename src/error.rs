//! # Error Handling
//!
//! Custom error types shared across the relay. Session-scoped faults carry
//! one of these variants to the supervisor, which maps them onto exactly one
//! WebSocket close event; per-frame and per-result anomalies never become an
//! `AppError` at all (they are logged and absorbed where they occur).
//!
//! ## Error Categories:
//! - **Config**: configuration file / environment problems (fatal at startup)
//! - **Validation**: connection parameters failed the schema (client-caused)
//! - **EngineSubmission**: the engine refused the streaming request
//! - **EngineStream**: the engine's result stream failed mid-session

use std::fmt;

/// Custom error types for the application.
#[derive(Debug)]
pub enum AppError {
    /// Configuration file or environment variable problems
    Config(String),

    /// Connection parameters failed validation rules
    Validation(String),

    /// The external engine rejected the streaming request outright
    EngineSubmission(String),

    /// The external engine's result stream raised a fault mid-session
    EngineStream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::EngineSubmission(msg) => write!(f, "Engine submission error: {}", msg),
            AppError::EngineStream(msg) => write!(f, "Engine stream error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Automatic conversion from configuration errors to AppError.
///
/// ## When this happens:
/// - config.toml file has invalid syntax
/// - Configuration values fail to deserialize into `AppConfig`
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category_and_message() {
        let err = AppError::Validation("missing token".to_string());
        assert_eq!(err.to_string(), "Validation error: missing token");

        let err = AppError::EngineStream("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));
    }
}
