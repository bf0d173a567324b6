//! Typed payloads for channel data frames
//!
//! All numeric fields arrive as JSON strings and are parsed into
//! [`Decimal`]. Fields the exchange populates with an empty string when
//! not applicable (e.g. the price of a market order) deserialize to
//! `None` via [`empty_str_as_none`] — an empty string is "absent", never
//! zero, because zero is a legitimate value for several of these fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::Side;

/// Deserialize an optional decimal where `""` means "not applicable"
pub fn empty_str_as_none<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Ticker data: best bid/ask and 24h statistics
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Instrument id
    pub inst_id: String,
    /// Last traded price
    pub last: Decimal,
    /// Last traded size
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub last_sz: Option<Decimal>,
    /// Best ask price (absent in a one-sided market)
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub ask_px: Option<Decimal>,
    /// Best ask size
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub ask_sz: Option<Decimal>,
    /// Best bid price (absent in a one-sided market)
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub bid_px: Option<Decimal>,
    /// Best bid size
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub bid_sz: Option<Decimal>,
    /// 24h open price
    #[serde(rename = "open24h", default, deserialize_with = "empty_str_as_none")]
    pub open_24h: Option<Decimal>,
    /// 24h high
    #[serde(rename = "high24h", default, deserialize_with = "empty_str_as_none")]
    pub high_24h: Option<Decimal>,
    /// 24h low
    #[serde(rename = "low24h", default, deserialize_with = "empty_str_as_none")]
    pub low_24h: Option<Decimal>,
    /// 24h volume in base currency
    #[serde(rename = "vol24h", default, deserialize_with = "empty_str_as_none")]
    pub vol_24h: Option<Decimal>,
    /// Data timestamp (millisecond epoch, as sent)
    pub ts: String,
}

/// Executed trade
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Instrument id
    pub inst_id: String,
    /// Trade id
    pub trade_id: String,
    /// Trade price
    pub px: Decimal,
    /// Trade size
    pub sz: Decimal,
    /// Taker side
    pub side: Side,
    /// Trade timestamp
    pub ts: String,
}

/// One orderbook price level: `[price, size, liquidated orders, order count]`
#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel(pub Decimal, pub Decimal, pub Decimal, pub Decimal);

impl BookLevel {
    /// Price of this level
    pub fn price(&self) -> Decimal {
        self.0
    }

    /// Total size at this level
    pub fn size(&self) -> Decimal {
        self.1
    }

    /// Number of orders at this level
    pub fn order_count(&self) -> Decimal {
        self.3
    }
}

/// Orderbook snapshot or incremental update
#[derive(Debug, Clone, Deserialize)]
pub struct BookData {
    /// Ask levels, ascending by price
    pub asks: Vec<BookLevel>,
    /// Bid levels, descending by price
    pub bids: Vec<BookLevel>,
    /// Data timestamp
    pub ts: String,
    /// Exchange-computed checksum over the top levels
    #[serde(default)]
    pub checksum: Option<i64>,
}

/// Candlestick: `[ts, open, high, low, close, volume, ...]`
///
/// The wire format is a positional string array; trailing elements
/// beyond the volume (quote volumes, confirm flag) are accepted and
/// ignored except for the confirm flag when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct Candle {
    /// Interval start (millisecond epoch, as sent)
    pub ts: String,
    /// Open price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Close price
    pub close: Decimal,
    /// Volume in base currency
    pub volume: Decimal,
    /// Whether the candle is closed
    pub confirmed: bool,
}

impl TryFrom<Vec<String>> for Candle {
    type Error = String;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        if fields.len() < 6 {
            return Err(format!("candle array too short: {} elements", fields.len()));
        }
        let parse = |s: &str, name: &str| -> Result<Decimal, String> {
            s.parse::<Decimal>()
                .map_err(|e| format!("candle {name}: {e}"))
        };
        Ok(Self {
            ts: fields[0].clone(),
            open: parse(&fields[1], "open")?,
            high: parse(&fields[2], "high")?,
            low: parse(&fields[3], "low")?,
            close: parse(&fields[4], "close")?,
            volume: parse(&fields[5], "volume")?,
            confirmed: fields.last().map(|s| s == "1").unwrap_or(false),
        })
    }
}

/// Private order update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Instrument id
    pub inst_id: String,
    /// Exchange order id
    pub ord_id: String,
    /// Client order id, if assigned
    #[serde(default)]
    pub cl_ord_id: Option<String>,
    /// Limit price; empty for market orders
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub px: Option<Decimal>,
    /// Order size
    pub sz: Decimal,
    /// Order type
    pub ord_type: String,
    /// Order side
    pub side: Side,
    /// Order state (`live`, `partially_filled`, `filled`, `canceled`)
    pub state: String,
    /// Accumulated filled size
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub acc_fill_sz: Option<Decimal>,
    /// Average fill price
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub avg_px: Option<Decimal>,
    /// Fee charged so far
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub fee: Option<Decimal>,
    /// Last update timestamp
    #[serde(default)]
    pub u_time: Option<String>,
}

impl Order {
    /// Returns true if the order can still fill
    pub fn is_live(&self) -> bool {
        matches!(self.state.as_str(), "live" | "partially_filled")
    }
}

/// Private position update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Instrument id
    pub inst_id: String,
    /// Instrument type
    pub inst_type: String,
    /// Position side (`long`, `short`, `net`)
    #[serde(default)]
    pub pos_side: Option<String>,
    /// Position size
    pub pos: Decimal,
    /// Average entry price
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub avg_px: Option<Decimal>,
    /// Unrealized PnL
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub upl: Option<Decimal>,
    /// Leverage
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub lever: Option<Decimal>,
    /// Last update timestamp
    #[serde(default)]
    pub u_time: Option<String>,
}

/// Per-currency balance detail
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    /// Currency
    pub ccy: String,
    /// Cash balance
    pub cash_bal: Decimal,
    /// Available balance
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub avail_bal: Option<Decimal>,
    /// Frozen balance
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub frozen_bal: Option<Decimal>,
}

/// Private account balance update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// Total equity in USD
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub total_eq: Option<Decimal>,
    /// Per-currency details
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
    /// Update timestamp
    #[serde(default)]
    pub u_time: Option<String>,
}

/// Open interest update (derivatives)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInterest {
    /// Instrument id
    pub inst_id: String,
    /// Open interest in contracts
    pub oi: Decimal,
    /// Open interest in currency
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub oi_ccy: Option<Decimal>,
    /// Data timestamp
    pub ts: String,
}

/// Mark price update (derivatives)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPrice {
    /// Instrument id
    pub inst_id: String,
    /// Mark price
    pub mark_px: Decimal,
    /// Data timestamp
    pub ts: String,
}

/// Funding rate update (perpetual swaps)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRate {
    /// Instrument id
    pub inst_id: String,
    /// Current funding rate
    pub funding_rate: Decimal,
    /// Predicted next funding rate
    #[serde(default, deserialize_with = "empty_str_as_none")]
    pub next_funding_rate: Option<Decimal>,
    /// Next funding time
    #[serde(default)]
    pub funding_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_parsing() {
        let raw = r#"{
            "instId": "BTC-USDT",
            "last": "9999.99",
            "lastSz": "0.1",
            "askPx": "10000",
            "askSz": "5",
            "bidPx": "9999.5",
            "bidSz": "2",
            "open24h": "9000",
            "high24h": "10500",
            "low24h": "8900",
            "vol24h": "12345",
            "ts": "1597026383085"
        }"#;
        let ticker: Ticker = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker.inst_id, "BTC-USDT");
        assert_eq!(ticker.last, dec!(9999.99));
        assert_eq!(ticker.bid_px, Some(dec!(9999.5)));
    }

    #[test]
    fn test_empty_string_price_is_absent_not_zero() {
        // A market order carries px: "" which must not become 0.0
        let raw = r#"{
            "instId": "BTC-USDT",
            "ordId": "312269865356374016",
            "px": "",
            "sz": "0.5",
            "ordType": "market",
            "side": "buy",
            "state": "filled",
            "avgPx": "9999.9",
            "fee": "-0.005"
        }"#;
        let order: Order = serde_json::from_str(raw).unwrap();
        assert_eq!(order.px, None);
        assert_eq!(order.avg_px, Some(dec!(9999.9)));
    }

    #[test]
    fn test_zero_price_is_a_value() {
        // "0" is a real price, distinct from absent
        let raw = r#"{
            "instId": "X-Y",
            "ordId": "1",
            "px": "0",
            "sz": "1",
            "ordType": "limit",
            "side": "sell",
            "state": "live"
        }"#;
        let order: Order = serde_json::from_str(raw).unwrap();
        assert_eq!(order.px, Some(Decimal::ZERO));
    }

    #[test]
    fn test_book_levels() {
        let raw = r#"{
            "asks": [["8476.98", "415", "0", "13"]],
            "bids": [["8476.97", "256", "0", "12"], ["8475.55", "101", "0", "1"]],
            "ts": "1597026383085",
            "checksum": -855196043
        }"#;
        let book: BookData = serde_json::from_str(raw).unwrap();
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks[0].price(), dec!(8476.98));
        assert_eq!(book.bids[0].size(), dec!(256));
        assert_eq!(book.checksum, Some(-855196043));
    }

    #[test]
    fn test_candle_from_array() {
        let raw = r#"["1597026383085","8533.02","8553.74","8527.17","8548.26","45247","529.5858061","4536105.4",  "0"]"#;
        let candle: Candle = serde_json::from_str(raw).unwrap();
        assert_eq!(candle.open, dec!(8533.02));
        assert_eq!(candle.close, dec!(8548.26));
        assert!(!candle.confirmed);
    }

    #[test]
    fn test_candle_too_short_rejected() {
        let raw = r#"["1597026383085","8533.02"]"#;
        assert!(serde_json::from_str::<Candle>(raw).is_err());
    }

    #[test]
    fn test_account_balance() {
        let raw = r#"{
            "totalEq": "41624.32",
            "uTime": "1597026383085",
            "details": [
                {"ccy": "BTC", "cashBal": "1.25", "availBal": "1.0", "frozenBal": "0.25"}
            ]
        }"#;
        let balance: AccountBalance = serde_json::from_str(raw).unwrap();
        assert_eq!(balance.total_eq, Some(dec!(41624.32)));
        assert_eq!(balance.details[0].ccy, "BTC");
        assert_eq!(balance.details[0].frozen_bal, Some(dec!(0.25)));
    }
}
