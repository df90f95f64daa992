//! Application error types
//!
//! Process-level errors: configuration, bind/serve failures, and pass-through
//! of domain errors from the ports.

use relay_core::DomainError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Server lifecycle errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<crate::config::ConfigError> for AppError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: AppError = crate::config::ConfigError::MissingVar("JWT_SECRET").into();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_domain_error_passthrough() {
        let err: AppError = DomainError::Unauthorized("bad token".to_string()).into();
        assert_eq!(err.to_string(), "unauthorized: bad token");
    }
}
