//! Request and response message types for the OKX V5 WebSocket API

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Side;

// ============================================================================
// Request Types
// ============================================================================

/// Subscribe/unsubscribe control frame: `{"op": ..., "args": [...]}`
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// "subscribe" or "unsubscribe"
    pub op: &'static str,
    /// Channel arguments
    pub args: Vec<SubscribeArg>,
}

impl SubscribeRequest {
    /// Create a subscribe frame
    pub fn subscribe(args: Vec<SubscribeArg>) -> Self {
        Self { op: "subscribe", args }
    }

    /// Create an unsubscribe frame
    pub fn unsubscribe(args: Vec<SubscribeArg>) -> Self {
        Self { op: "unsubscribe", args }
    }
}

/// One channel argument inside a subscribe frame or a data frame header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeArg {
    /// Channel name (`tickers`, `books`, `candle1m`, ...)
    pub channel: String,
    /// Instrument id (e.g. `BTC-USDT`)
    #[serde(rename = "instId", default, skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,
    /// Instrument type scope (private/derivatives channels)
    #[serde(rename = "instType", default, skip_serializing_if = "Option::is_none")]
    pub inst_type: Option<String>,
}

impl SubscribeArg {
    /// Create an argument for an instrument-scoped channel
    pub fn with_inst(channel: impl Into<String>, inst_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            inst_id: Some(inst_id.into()),
            inst_type: None,
        }
    }
}

/// Login control frame: `{"op": "login", "args": [{apiKey, passphrase, timestamp, sign}]}`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Always "login"
    pub op: &'static str,
    /// Login arguments (a single entry)
    pub args: Vec<LoginArgs>,
}

impl LoginRequest {
    /// Create a login frame
    pub fn new(args: LoginArgs) -> Self {
        Self { op: "login", args: vec![args] }
    }
}

/// Signed login arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    /// API key
    pub api_key: String,
    /// API passphrase
    pub passphrase: String,
    /// Whole-second epoch timestamp used in the signature
    pub timestamp: String,
    /// Base64 HMAC-SHA256 signature
    pub sign: String,
}

/// Correlated operation frame (order placement over the stream)
///
/// The `id` is echoed back in the matching [`OpResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct OpRequest {
    /// Caller-supplied request id
    pub id: String,
    /// Operation name (`order`, `batch-orders`, `cancel-order`, ...)
    pub op: String,
    /// Operation arguments
    pub args: serde_json::Value,
}

/// Arguments for placing a single order over the stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderArgs {
    /// Instrument id
    pub inst_id: String,
    /// Trade mode: `cash`, `cross` or `isolated`
    pub td_mode: String,
    /// Order side
    pub side: Side,
    /// Order type: `limit`, `market`, `post_only`, ...
    pub ord_type: String,
    /// Order size
    pub sz: Decimal,
    /// Limit price; omitted for market orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<Decimal>,
    /// Client-assigned order id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

impl OrderArgs {
    /// Create limit order arguments
    pub fn limit(
        inst_id: impl Into<String>,
        td_mode: impl Into<String>,
        side: Side,
        sz: Decimal,
        px: Decimal,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            td_mode: td_mode.into(),
            side,
            ord_type: "limit".to_string(),
            sz,
            px: Some(px),
            cl_ord_id: None,
        }
    }

    /// Create market order arguments
    pub fn market(
        inst_id: impl Into<String>,
        td_mode: impl Into<String>,
        side: Side,
        sz: Decimal,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            td_mode: td_mode.into(),
            side,
            ord_type: "market".to_string(),
            sz,
            px: None,
            cl_ord_id: None,
        }
    }

    /// Attach a client order id
    pub fn with_cl_ord_id(mut self, id: impl Into<String>) -> Self {
        self.cl_ord_id = Some(id.into());
        self
    }
}

/// Arguments for cancelling an order over the stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelArgs {
    /// Instrument id
    pub inst_id: String,
    /// Exchange order id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_id: Option<String>,
    /// Client order id (alternative to `ord_id`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

impl CancelArgs {
    /// Cancel by exchange order id
    pub fn by_ord_id(inst_id: impl Into<String>, ord_id: impl Into<String>) -> Self {
        Self {
            inst_id: inst_id.into(),
            ord_id: Some(ord_id.into()),
            cl_ord_id: None,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Event frame: subscribe/unsubscribe acknowledgement, login result, error
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Event name: `subscribe`, `unsubscribe`, `login`, `error`
    pub event: String,
    /// Result code ("0" on success)
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub msg: Option<String>,
    /// Echoed channel argument (subscribe/unsubscribe acks)
    #[serde(default)]
    pub arg: Option<SubscribeArg>,
}

impl EventMessage {
    /// Returns true if the frame carries a success code (or none at all)
    pub fn is_success(&self) -> bool {
        match self.code.as_deref() {
            None | Some("0") => true,
            Some(_) => false,
        }
    }
}

/// Data frame: `{"arg": {...}, "data": [...], "action"?: ...}`
///
/// Payload items stay as raw JSON here; the dispatcher parses them
/// per-channel so a malformed item cannot poison the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct DataMessage {
    /// Channel argument identifying the stream
    pub arg: SubscribeArg,
    /// Book action (`snapshot` or `update`), books channel only
    #[serde(default)]
    pub action: Option<String>,
    /// Payload items
    pub data: Vec<serde_json::Value>,
}

/// Correlated response to an [`OpRequest`]
#[derive(Debug, Clone, Deserialize)]
pub struct OpResponse {
    /// Echoed request id
    pub id: String,
    /// Operation name
    pub op: String,
    /// Result code ("0" on success)
    pub code: String,
    /// Human-readable message
    #[serde(default)]
    pub msg: String,
    /// Per-order results
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl OpResponse {
    /// Returns true if the operation succeeded
    pub fn is_success(&self) -> bool {
        self.code == "0"
    }
}

// ============================================================================
// Raw Frame Classification
// ============================================================================

/// Classified inbound frame
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// Literal keepalive reply to an outbound `"ping"`
    Pong,
    /// Correlated operation response
    Op(OpResponse),
    /// Event frame
    Event(EventMessage),
    /// Channel data frame
    Data(DataMessage),
    /// Unknown/unsupported frame
    Unknown(serde_json::Value),
}

impl WsMessage {
    /// Classify a raw text frame
    ///
    /// Classification order matters: the literal pong first, then
    /// correlated responses (both `id` and `op` present), then event
    /// frames, then data frames.
    pub fn classify(text: &str) -> Result<Self, serde_json::Error> {
        if text == "pong" {
            return Ok(Self::Pong);
        }

        let value: serde_json::Value = serde_json::from_str(text)?;

        if value.get("id").is_some() && value.get("op").is_some() {
            let resp: OpResponse = serde_json::from_value(value)?;
            return Ok(Self::Op(resp));
        }

        if value.get("event").is_some() {
            let event: EventMessage = serde_json::from_value(value)?;
            return Ok(Self::Event(event));
        }

        if value.get("arg").is_some() && value.get("data").is_some() {
            let data: DataMessage = serde_json::from_value(value)?;
            return Ok(Self::Data(data));
        }

        Ok(Self::Unknown(value))
    }
}
