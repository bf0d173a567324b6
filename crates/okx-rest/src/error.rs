//! REST error types

use thiserror::Error;

/// Errors from the REST client
#[derive(Error, Debug)]
pub enum RestError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Exchange returned a non-zero result code
    #[error("API error (code {code}): {message}")]
    Api {
        /// Exchange error code
        code: String,
        /// Human-readable message
        message: String,
    },

    /// Credentials are required for this request
    #[error("authentication required")]
    AuthRequired,

    /// Query string could not be encoded
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] serde_urlencoded::ser::Error),

    /// Request body could not be encoded
    #[error("invalid body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Result alias for REST operations
pub type RestResult<T> = Result<T, RestError>;
