//! Channel, interval, instrument-type and side enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Candlestick intervals supported by the candle channel
///
/// The interval is embedded in the channel name on the wire
/// (`candle1m`, `candle15m`, ...), so this enum round-trips through
/// [`CandleInterval::as_str`] and [`CandleInterval::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleInterval {
    /// 1 minute
    M1,
    /// 3 minutes
    M3,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 30 minutes
    M30,
    /// 1 hour
    H1,
    /// 2 hours
    H2,
    /// 4 hours
    H4,
    /// 1 day
    D1,
    /// 1 week
    W1,
}

impl CandleInterval {
    /// Interval suffix as used in the channel name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1H",
            Self::H2 => "2H",
            Self::H4 => "4H",
            Self::D1 => "1D",
            Self::W1 => "1W",
        }
    }

    /// Parse an interval suffix (the part of the channel name after `candle`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::M1),
            "3m" => Some(Self::M3),
            "5m" => Some(Self::M5),
            "15m" => Some(Self::M15),
            "30m" => Some(Self::M30),
            "1H" => Some(Self::H1),
            "2H" => Some(Self::H2),
            "4H" => Some(Self::H4),
            "1D" => Some(Self::D1),
            "1W" => Some(Self::W1),
            _ => None,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// WebSocket channel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Channel {
    /// Tickers channel - best bid/ask and 24h stats
    Tickers,
    /// Trades channel - executed trades
    Trades,
    /// Books channel - Level 2 orderbook snapshots and updates
    Books,
    /// Candle channel - candlesticks at the given interval
    Candle(CandleInterval),
    /// Open interest channel (derivatives)
    OpenInterest,
    /// Mark price channel (derivatives)
    MarkPrice,
    /// Funding rate channel (perpetual swaps)
    FundingRate,
    /// Orders channel - private order updates
    Orders,
    /// Positions channel - private position updates
    Positions,
    /// Account channel - private balance updates
    Account,
}

impl Channel {
    /// Returns the channel name as used in subscribe frames and data frames
    pub fn channel_name(&self) -> String {
        match self {
            Self::Tickers => "tickers".to_string(),
            Self::Trades => "trades".to_string(),
            Self::Books => "books".to_string(),
            Self::Candle(interval) => format!("candle{}", interval.as_str()),
            Self::OpenInterest => "open-interest".to_string(),
            Self::MarkPrice => "mark-price".to_string(),
            Self::FundingRate => "funding-rate".to_string(),
            Self::Orders => "orders".to_string(),
            Self::Positions => "positions".to_string(),
            Self::Account => "account".to_string(),
        }
    }

    /// Parse a channel name from an inbound frame
    ///
    /// Returns `None` for channels this crate does not model.
    pub fn from_channel_name(name: &str) -> Option<Self> {
        if let Some(suffix) = name.strip_prefix("candle") {
            return CandleInterval::parse(suffix).map(Self::Candle);
        }
        match name {
            "tickers" => Some(Self::Tickers),
            "trades" => Some(Self::Trades),
            "books" => Some(Self::Books),
            "open-interest" => Some(Self::OpenInterest),
            "mark-price" => Some(Self::MarkPrice),
            "funding-rate" => Some(Self::FundingRate),
            "orders" => Some(Self::Orders),
            "positions" => Some(Self::Positions),
            "account" => Some(Self::Account),
            _ => None,
        }
    }

    /// Returns true if this is a private (authenticated) channel
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Orders | Self::Positions | Self::Account)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel_name())
    }
}

/// Instrument types, used as a subscription scope for derivatives channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstType {
    /// Spot markets
    Spot,
    /// Margin markets
    Margin,
    /// Perpetual swaps
    Swap,
    /// Dated futures
    Futures,
    /// Options
    Option,
    /// All instrument types
    Any,
}

impl InstType {
    /// Returns the instrument type as used in API messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "SPOT",
            Self::Margin => "MARGIN",
            Self::Swap => "SWAP",
            Self::Futures => "FUTURES",
            Self::Option => "OPTION",
            Self::Any => "ANY",
        }
    }
}

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Action carried by orderbook data frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction {
    /// Full book state
    Snapshot,
    /// Incremental changes
    Update,
}

impl BookAction {
    /// Parse the `action` field of a data frame
    ///
    /// Frames without an action (shallow book variants) are snapshots.
    pub fn parse(action: Option<&str>) -> Self {
        match action {
            Some("update") => Self::Update,
            _ => Self::Snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_round_trip() {
        let channels = [
            Channel::Tickers,
            Channel::Trades,
            Channel::Books,
            Channel::Candle(CandleInterval::M15),
            Channel::OpenInterest,
            Channel::MarkPrice,
            Channel::FundingRate,
            Channel::Orders,
            Channel::Positions,
            Channel::Account,
        ];
        for channel in channels {
            let name = channel.channel_name();
            assert_eq!(Channel::from_channel_name(&name), Some(channel));
        }
    }

    #[test]
    fn test_candle_channel_embeds_interval() {
        assert_eq!(Channel::Candle(CandleInterval::M1).channel_name(), "candle1m");
        assert_eq!(Channel::Candle(CandleInterval::H4).channel_name(), "candle4H");
        assert_eq!(
            Channel::from_channel_name("candle1D"),
            Some(Channel::Candle(CandleInterval::D1))
        );
        assert_eq!(Channel::from_channel_name("candle7s"), None);
    }

    #[test]
    fn test_private_channels() {
        assert!(Channel::Orders.is_private());
        assert!(Channel::Positions.is_private());
        assert!(Channel::Account.is_private());
        assert!(!Channel::Tickers.is_private());
        assert!(!Channel::Books.is_private());
    }

    #[test]
    fn test_unknown_channel() {
        assert_eq!(Channel::from_channel_name("price-limit"), None);
    }

    #[test]
    fn test_book_action() {
        assert_eq!(BookAction::parse(Some("snapshot")), BookAction::Snapshot);
        assert_eq!(BookAction::parse(Some("update")), BookAction::Update);
        assert_eq!(BookAction::parse(None), BookAction::Snapshot);
    }
}
