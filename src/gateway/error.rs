//! Error types for the scoring gateway.

use thiserror::Error;

/// Errors that can occur when calling the scoring provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error (missing API key, etc.).
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider-level error - may be retryable.
    #[error("provider error: {message}")]
    Provider { message: String, retryable: bool },

    /// The model refused to score the request - permanent.
    #[error("refused: {0}")]
    Refused(String),

    /// Invalid request - permanent, don't retry.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider response carried no usage block.
    #[error("missing usage in provider response")]
    MissingUsage,
}

impl GatewayError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider {
            message: message.into(),
            retryable,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Provider { retryable, .. } => *retryable,
            Self::Refused(_) => false,
            Self::InvalidRequest(_) => false,
            Self::MissingUsage => false,
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Http(_) => "http_error",
            Self::Provider { .. } => "provider_error",
            Self::Refused(_) => "refused",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MissingUsage => "missing_usage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_variant() {
        assert!(GatewayError::provider("upstream 503", true).is_retryable());
        assert!(!GatewayError::provider("bad model id", false).is_retryable());
        assert!(!GatewayError::config("no key").is_retryable());
        assert!(!GatewayError::refused("nope").is_retryable());
        assert!(!GatewayError::MissingUsage.is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(GatewayError::config("x").code(), "config_error");
        assert_eq!(GatewayError::MissingUsage.code(), "missing_usage");
    }
}
