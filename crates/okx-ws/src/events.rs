//! Connection, subscription and data events
//!
//! Inbound frames are decoded into these typed events and delivered
//! through the event stream taken from the connection manager.

use okx_types::{
    AccountBalance, BookAction, BookData, Candle, CandleInterval, FundingRate, MarkPrice,
    OpenInterest, Order, Position, Ticker, Trade,
};

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network error occurred
    NetworkError(String),
    /// Client requested shutdown
    Shutdown,
}

/// Connection lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Successfully connected to the endpoint
    Connected {
        /// Endpoint URL
        endpoint: String,
    },
    /// Connection was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Supervisor is attempting to reconnect
    Reconnecting {
        /// Consecutive failures so far, plus one for this attempt
        attempt: u32,
    },
    /// Login acknowledged by the server
    LoggedIn,
    /// Login rejected by the server
    LoginFailed {
        /// Error code
        code: String,
        /// Error message
        message: String,
    },
    /// Subscriptions replayed after a reconnect
    SubscriptionsRestored {
        /// Number of subscription keys covered
        count: usize,
    },
}

/// Subscription-specific events
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// Subscription confirmed by the server
    Subscribed {
        /// Channel name
        channel: String,
        /// Instrument id, if any
        inst_id: Option<String>,
    },
    /// Unsubscription confirmed by the server
    Unsubscribed {
        /// Channel name
        channel: String,
        /// Instrument id, if any
        inst_id: Option<String>,
    },
}

/// Market data events (public channels)
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Ticker update
    Ticker(Ticker),
    /// Executed trade
    Trade(Trade),
    /// Orderbook snapshot or update
    Book {
        /// Instrument id
        inst_id: String,
        /// Snapshot or incremental update
        action: BookAction,
        /// Book levels
        data: BookData,
    },
    /// Candlestick update
    Candle {
        /// Instrument id
        inst_id: String,
        /// Interval recovered from the channel name
        interval: CandleInterval,
        /// Candle payload
        candle: Candle,
    },
    /// Open interest update
    OpenInterest(OpenInterest),
    /// Mark price update
    MarkPrice(MarkPrice),
    /// Funding rate update
    FundingRate(FundingRate),
}

/// Private channel events (requires authentication)
#[derive(Debug, Clone)]
pub enum PrivateEvent {
    /// Order update
    Order(Order),
    /// Position update
    Position(Position),
    /// Account balance update
    Account(AccountBalance),
}

/// Combined event type for the event stream
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection-related event
    Connection(ConnectionEvent),
    /// Subscription-related event
    Subscription(SubscriptionEvent),
    /// Market data event
    Market(MarketEvent),
    /// Private channel event
    Private(Box<PrivateEvent>),
    /// Generic error frame from the server
    Error {
        /// Error code
        code: String,
        /// Error message
        message: String,
    },
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Event::Connection(event)
    }
}

impl From<SubscriptionEvent> for Event {
    fn from(event: SubscriptionEvent) -> Self {
        Event::Subscription(event)
    }
}

impl From<MarketEvent> for Event {
    fn from(event: MarketEvent) -> Self {
        Event::Market(event)
    }
}

impl From<PrivateEvent> for Event {
    fn from(event: PrivateEvent) -> Self {
        Event::Private(Box::new(event))
    }
}
