//! WebSocket connectivity core for the OKX V5 streaming API
//!
//! This crate maintains a persistent, authenticated, message-based
//! connection to the exchange, keeps a registry of active
//! subscriptions, survives network failures by reconnecting and
//! replaying subscription state, and decodes inbound frames into typed
//! events for downstream consumers.
//!
//! # Features
//!
//! - Connection state machine with automatic reconnection at a fixed
//!   cooldown and full subscription replay
//! - Signed login handshake for private endpoints
//! - Typed event stream for market data and private account updates
//! - Order placement over the stream with correlated responses
//! - Trait-injected transport, so connection logic is testable without
//!   any network
//!
//! # Example
//!
//! ```no_run
//! use okx_ws::{ConnectionConfig, ConnectionManager, Endpoint, SubscriptionKey, WsTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new().with_endpoint(Endpoint::Public);
//!     let transport = WsTransport::new(config.endpoint.url());
//!     let manager = ConnectionManager::new(config, transport);
//!
//!     let mut events = manager.take_event_receiver().unwrap();
//!     manager.connect().await?;
//!     manager.subscribe(SubscriptionKey::ticker("BTC-USDT")).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod events;
pub mod subscription;
pub mod trading;
pub mod transport;

// Re-export main types
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, LoginGate, ReconnectState,
};
pub use dispatcher::MessageDispatcher;
pub use endpoint::Endpoint;
pub use events::{
    ConnectionEvent, DisconnectReason, Event, MarketEvent, PrivateEvent, SubscriptionEvent,
};
pub use subscription::{replay_frames, SubscriptionKey, SubscriptionRegistry, MAX_ARGS_PER_FRAME};
pub use transport::{Transport, TransportError, WsTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockTransport;
