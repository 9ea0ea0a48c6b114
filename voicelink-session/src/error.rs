//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Message shown when neither a sandbox ID nor a token endpoint is configured.
pub const NO_TOKEN_SOURCE_MESSAGE: &str =
    "No token source configured. Please set SANDBOX_ID or TOKEN_ENDPOINT in your environment.";

/// Errors that can reach the user-visible layer.
///
/// Data-channel decode failures are not part of this enum: they are recovered
/// locally by the codec and only logged.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Neither a sandbox ID nor a token endpoint is configured.
    #[error("{}", NO_TOKEN_SOURCE_MESSAGE)]
    NoTokenSource,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The token request could not be sent or its body could not be read.
    #[error("Token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),

    /// The token service answered with a non-success status.
    #[error("{context}: {status}")]
    TokenResponse {
        /// What was being fetched.
        context: String,
        /// HTTP status reason.
        status: String,
    },

    /// The token service answered without a usable token or server URL.
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Transport connect/handshake failure.
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// The caller dropped `start()` before the connection came up.
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// Operation requires a connected room.
    #[error("Session not connected")]
    NotConnected,

    /// Any other transport failure (send, disconnect).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SessionError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an error for a non-success token response.
    pub fn token_response<C: Into<String>, S: Into<String>>(context: C, status: S) -> Self {
        Self::TokenResponse { context: context.into(), status: status.into() }
    }

    /// Configuration problems need a config change, not a retry.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NoTokenSource | Self::ConfigError(_))
    }

    /// Network and handshake failures can be retried by starting again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TokenRequest(_)
                | Self::TokenResponse { .. }
                | Self::InvalidTokenResponse(_)
                | Self::ConnectionError(_)
                | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_token_source_is_a_configuration_error() {
        let err = SessionError::NoTokenSource;
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), NO_TOKEN_SOURCE_MESSAGE);
    }

    #[test]
    fn handshake_errors_are_retryable() {
        let err = SessionError::token_response("Sandbox fetch failed", "Forbidden");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Sandbox fetch failed: Forbidden");

        let err = SessionError::connection("signal timeout");
        assert!(err.is_retryable());
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "Connection failed: signal timeout");
    }

    #[test]
    fn not_connected_is_neither() {
        let err = SessionError::NotConnected;
        assert!(!err.is_retryable());
        assert!(!err.is_configuration());
    }
}
