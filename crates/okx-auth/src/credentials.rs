//! API credentials
//!
//! # Security
//!
//! The secret key and passphrase are stored using the `secrecy` crate
//! which:
//! - Zeroizes memory on drop (prevents memory scanning)
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, AuthResult};
use crate::signer;

/// API credentials for authenticated requests
///
/// Immutable after construction. The secret key and passphrase are
/// zeroized when the credentials are dropped.
pub struct Credentials {
    /// API key (public)
    api_key: String,
    /// Secret key used for signing
    secret_key: SecretString,
    /// Account passphrase
    passphrase: SecretString,
    /// Demo-trading (testnet) account
    is_testnet: bool,
}

impl Credentials {
    /// Create new credentials
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: SecretString::from(secret_key.into()),
            passphrase: SecretString::from(passphrase.into()),
            is_testnet: false,
        }
    }

    /// Mark these credentials as belonging to a demo-trading account
    pub fn with_testnet(mut self, is_testnet: bool) -> Self {
        self.is_testnet = is_testnet;
        self
    }

    /// Create credentials from environment variables
    ///
    /// Reads `OKX_API_KEY`, `OKX_SECRET_KEY` and `OKX_PASSPHRASE`;
    /// `OKX_TESTNET=1` selects demo trading.
    pub fn from_env() -> AuthResult<Self> {
        let api_key = std::env::var("OKX_API_KEY")
            .map_err(|_| AuthError::EnvVarNotSet("OKX_API_KEY".to_string()))?;
        let secret_key = std::env::var("OKX_SECRET_KEY")
            .map_err(|_| AuthError::EnvVarNotSet("OKX_SECRET_KEY".to_string()))?;
        let passphrase = std::env::var("OKX_PASSPHRASE")
            .map_err(|_| AuthError::EnvVarNotSet("OKX_PASSPHRASE".to_string()))?;
        let is_testnet = std::env::var("OKX_TESTNET").map(|v| v == "1").unwrap_or(false);

        Ok(Self::new(api_key, secret_key, passphrase).with_testnet(is_testnet))
    }

    /// Get the API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the passphrase for request headers and login frames
    pub fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }

    /// Whether these credentials target the demo-trading environment
    pub fn is_testnet(&self) -> bool {
        self.is_testnet
    }

    /// Sign a request with this account's secret
    ///
    /// See [`signer::sign`] for the algorithm; `timestamp` must already
    /// be in the format the target surface requires.
    pub fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        signer::sign(self.secret_key.expose_secret(), timestamp, method, path, body)
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            api_key: self.api_key.clone(),
            secret_key: SecretString::from(self.secret_key.expose_secret().to_string()),
            passphrase: SecretString::from(self.passphrase.expose_secret().to_string()),
            is_testnet: self.is_testnet,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "api_key",
                &format!("{}...", &self.api_key[..8.min(self.api_key.len())]),
            )
            .field("secret_key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .field("is_testnet", &self.is_testnet)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("test_api_key", "test_secret", "test_phrase");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("test_secret"));
        assert!(!debug.contains("test_phrase"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_signing_consistency() {
        let creds = Credentials::new("key", "secret", "phrase");
        let a = creds.sign("1597026383", "GET", "/users/self/verify", "");
        let b = creds.sign("1597026383", "GET", "/users/self/verify", "");
        assert_eq!(a, b);

        let clone = creds.clone();
        assert_eq!(a, clone.sign("1597026383", "GET", "/users/self/verify", ""));
    }

    #[test]
    fn test_testnet_flag() {
        let creds = Credentials::new("k", "s", "p").with_testnet(true);
        assert!(creds.is_testnet());
    }
}
