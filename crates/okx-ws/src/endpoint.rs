//! WebSocket endpoint definitions

use std::fmt;

/// OKX V5 WebSocket endpoints
///
/// The streaming API is split by category: public market data, private
/// account data and the business endpoint (candlesticks and other
/// high-volume feeds). Each has a demo-trading twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Public market data (default)
    #[default]
    Public,
    /// Authenticated private data
    Private,
    /// Business endpoint (candlesticks etc.)
    Business,
    /// Public demo trading
    PublicDemo,
    /// Authenticated demo trading
    PrivateDemo,
    /// Business demo trading
    BusinessDemo,
}

impl Endpoint {
    /// Get the WebSocket URL for this endpoint
    pub fn url(&self) -> &'static str {
        match self {
            Self::Public => "wss://ws.okx.com:8443/ws/v5/public",
            Self::Private => "wss://ws.okx.com:8443/ws/v5/private",
            Self::Business => "wss://ws.okx.com:8443/ws/v5/business",
            Self::PublicDemo => "wss://wspap.okx.com:8443/ws/v5/public",
            Self::PrivateDemo => "wss://wspap.okx.com:8443/ws/v5/private",
            Self::BusinessDemo => "wss://wspap.okx.com:8443/ws/v5/business",
        }
    }

    /// Check if this endpoint requires a login handshake
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Private | Self::PrivateDemo)
    }

    /// Check if this endpoint targets the demo-trading environment
    pub fn is_demo(&self) -> bool {
        matches!(self, Self::PublicDemo | Self::PrivateDemo | Self::BusinessDemo)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}
