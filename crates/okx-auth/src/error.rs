//! Authentication error types

use thiserror::Error;

/// Errors from credential handling
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required environment variable was not set
    #[error("environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Credentials were malformed
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Result alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;
