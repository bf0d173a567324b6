//! Subscription registry and replay grouping
//!
//! The registry tracks the set of currently-desired channel
//! subscriptions so the reconnection supervisor can replay them after a
//! reconnect - the server keeps no subscription state across
//! connections. Keys are a composite of channel, optional instrument id
//! and optional extra scope parameter; add/remove are idempotent set
//! operations.

use okx_types::{CandleInterval, Channel, InstType, SubscribeArg, SubscribeRequest};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// Maximum channel arguments packed into one subscribe frame
///
/// The exchange bounds subscribe frames by total size rather than a
/// documented arg count; 20 args stays comfortably under that bound for
/// the longest instrument-id forms.
pub const MAX_ARGS_PER_FRAME: usize = 20;

/// Identity of one desired subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Channel
    pub channel: Channel,
    /// Instrument id (e.g. `BTC-USDT`), when the channel is per-instrument
    pub inst_id: Option<String>,
    /// Extra scope parameter (instrument type for position/order channels)
    pub extra: Option<String>,
}

impl SubscriptionKey {
    /// Create a bare key
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            inst_id: None,
            extra: None,
        }
    }

    /// Ticker subscription for an instrument
    pub fn ticker(inst_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::Tickers,
            inst_id: Some(inst_id.into()),
            extra: None,
        }
    }

    /// Trades subscription for an instrument
    pub fn trades(inst_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::Trades,
            inst_id: Some(inst_id.into()),
            extra: None,
        }
    }

    /// Orderbook subscription for an instrument
    pub fn books(inst_id: impl Into<String>) -> Self {
        Self {
            channel: Channel::Books,
            inst_id: Some(inst_id.into()),
            extra: None,
        }
    }

    /// Candlestick subscription for an instrument at an interval
    pub fn candles(inst_id: impl Into<String>, interval: CandleInterval) -> Self {
        Self {
            channel: Channel::Candle(interval),
            inst_id: Some(inst_id.into()),
            extra: None,
        }
    }

    /// Private order updates scoped by instrument type
    pub fn orders(inst_type: InstType) -> Self {
        Self {
            channel: Channel::Orders,
            inst_id: None,
            extra: Some(inst_type.as_str().to_string()),
        }
    }

    /// Private position updates scoped by instrument type
    pub fn positions(inst_type: InstType) -> Self {
        Self {
            channel: Channel::Positions,
            inst_id: None,
            extra: Some(inst_type.as_str().to_string()),
        }
    }

    /// Private account balance updates
    pub fn account() -> Self {
        Self::new(Channel::Account)
    }

    /// Convert to a wire-level channel argument
    pub fn to_arg(&self) -> SubscribeArg {
        SubscribeArg {
            channel: self.channel.channel_name(),
            inst_id: self.inst_id.clone(),
            inst_type: self.extra.clone(),
        }
    }

    /// Whether this key may be coalesced into a multi-instrument frame
    ///
    /// Keys carrying an extra scope parameter are replayed individually.
    fn is_groupable(&self) -> bool {
        self.extra.is_none()
    }
}

/// Tracks the set of currently-desired subscriptions
///
/// Shared between the public subscribe/unsubscribe API and the
/// supervisor's replay step; one mutex guards the set. `snapshot`
/// copies under the lock and releases it before the caller touches the
/// network - the subscribe calls re-enter `add`, so holding the lock
/// across them would deadlock.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    keys: Mutex<HashSet<SubscriptionKey>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a desired subscription; inserting twice is a no-op
    ///
    /// Returns true if the key was newly inserted.
    pub fn add(&self, key: SubscriptionKey) -> bool {
        self.keys.lock().insert(key)
    }

    /// Drop a desired subscription; removing an absent key is a no-op
    ///
    /// Returns true if the key was present.
    pub fn remove(&self, key: &SubscriptionKey) -> bool {
        self.keys.lock().remove(key)
    }

    /// Check whether a key is currently desired
    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.keys.lock().contains(key)
    }

    /// Number of desired subscriptions
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    /// Remove all keys (permanent shutdown only; reconnects must not clear)
    pub fn clear(&self) {
        self.keys.lock().clear();
    }

    /// Copy the full key set, releasing the lock before returning
    pub fn snapshot(&self) -> Vec<SubscriptionKey> {
        let guard = self.keys.lock();
        guard.iter().cloned().collect()
    }
}

/// Build the subscribe frames that restore a snapshot of keys
///
/// Same-channel keys coalesce into one multi-instrument frame per
/// channel (candle channels at different intervals are distinct
/// channels on the wire), chunked at [`MAX_ARGS_PER_FRAME`]. Keys with
/// an extra scope parameter get one single-arg frame each. Output
/// ordering is deterministic.
pub fn replay_frames(keys: &[SubscriptionKey]) -> Vec<SubscribeRequest> {
    let mut grouped: BTreeMap<String, Vec<SubscribeArg>> = BTreeMap::new();
    let mut individual: Vec<SubscribeArg> = Vec::new();

    for key in keys {
        if key.is_groupable() {
            grouped
                .entry(key.channel.channel_name())
                .or_default()
                .push(key.to_arg());
        } else {
            individual.push(key.to_arg());
        }
    }

    let mut frames = Vec::new();
    for (_channel, mut args) in grouped {
        args.sort_by(|a, b| a.inst_id.cmp(&b.inst_id));
        for chunk in args.chunks(MAX_ARGS_PER_FRAME) {
            frames.push(SubscribeRequest::subscribe(chunk.to_vec()));
        }
    }

    individual.sort_by(|a, b| (&a.channel, &a.inst_type).cmp(&(&b.channel, &b.inst_type)));
    for arg in individual {
        frames.push(SubscribeRequest::subscribe(vec![arg]));
    }

    frames
}
