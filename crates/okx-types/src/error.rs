//! Error types shared across the workspace

use std::time::Duration;
use thiserror::Error;

/// Main error type for connectivity operations
#[derive(Error, Debug)]
pub enum OkxError {
    // === Connection Errors ===
    /// Failed to establish the streaming connection
    #[error("failed to connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Connection attempt timed out
    #[error("connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation requires an open connection
    #[error("not connected")]
    NotConnected,

    // === Protocol Errors ===
    /// Failed to parse a JSON frame
    #[error("invalid JSON: {message}")]
    InvalidJson {
        message: String,
        raw: Option<String>,
    },

    /// Server rejected a subscription
    #[error("subscription rejected for {channel}: {reason}")]
    SubscriptionRejected { channel: String, reason: String },

    // === Authentication Errors ===
    /// Login was rejected by the server
    #[error("login failed (code {code}): {message}")]
    LoginFailed { code: String, message: String },

    /// No login acknowledgement within the allowed window
    #[error("login timeout after {timeout:?}")]
    LoginTimeout { timeout: Duration },

    /// Credentials are required for this endpoint
    #[error("credentials required for private endpoint")]
    CredentialsRequired,

    // === Operation Errors ===
    /// Correlated request received no response in time
    #[error("request {id} timed out after {timeout:?}")]
    RequestTimeout { id: String, timeout: Duration },

    /// Exchange returned a non-zero result code
    #[error("exchange error (code {code}): {message}")]
    Api { code: String, message: String },

    // === Internal Errors ===
    /// Internal channel was closed unexpectedly
    #[error("internal channel closed unexpectedly")]
    ChannelClosed,

    /// Client is shutting down
    #[error("shutdown in progress")]
    ShuttingDown,
}

impl OkxError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::Transport(_)
                | Self::NotConnected
                | Self::RequestTimeout { .. }
        )
    }
}

/// Result alias for connectivity operations
pub type OkxResult<T> = Result<T, OkxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OkxError::Transport("reset".into()).is_retryable());
        assert!(OkxError::NotConnected.is_retryable());
        assert!(!OkxError::LoginFailed {
            code: "60009".into(),
            message: "bad sign".into()
        }
        .is_retryable());
        assert!(!OkxError::ShuttingDown.is_retryable());
    }
}
