//! Inbound frame classification and routing
//!
//! Every text frame received from the transport passes through
//! [`MessageDispatcher::dispatch`], which classifies it in priority
//! order - keepalive reply, correlated op response, event frame, data
//! frame - and routes it to the pending-op map, the login gate or the
//! typed event stream.
//!
//! Fault isolation: a malformed frame is dropped with a warning and the
//! connection stays up; a malformed item inside a batch payload is
//! skipped and the remaining items are still delivered.

use dashmap::DashMap;
use okx_types::{
    AccountBalance, BookAction, BookData, Candle, Channel, DataMessage, EventMessage, FundingRate,
    MarkPrice, OpenInterest, OpResponse, Order, Position, Ticker, Trade, WsMessage,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::connection::LoginGate;
use crate::events::{ConnectionEvent, Event, MarketEvent, PrivateEvent, SubscriptionEvent};

/// Pending correlated operations, keyed by request id
pub type PendingOps = Arc<DashMap<String, oneshot::Sender<OpResponse>>>;

/// Classifies inbound frames and routes them to typed consumers
pub struct MessageDispatcher {
    event_tx: mpsc::UnboundedSender<Event>,
    pending_ops: PendingOps,
    login_gate: Arc<LoginGate>,
}

impl MessageDispatcher {
    /// Create a dispatcher
    pub fn new(
        event_tx: mpsc::UnboundedSender<Event>,
        pending_ops: PendingOps,
        login_gate: Arc<LoginGate>,
    ) -> Self {
        Self {
            event_tx,
            pending_ops,
            login_gate,
        }
    }

    /// Classify and route one inbound text frame
    pub fn dispatch(&self, text: &str) {
        match WsMessage::classify(text) {
            Ok(WsMessage::Pong) => {
                debug!("keepalive pong received");
            }
            Ok(WsMessage::Op(resp)) => self.handle_op_response(resp),
            Ok(WsMessage::Event(event)) => self.handle_event(event),
            Ok(WsMessage::Data(msg)) => self.handle_data(msg),
            Ok(WsMessage::Unknown(value)) => {
                debug!("unhandled frame: {}", value);
            }
            Err(e) => {
                warn!("dropping malformed frame: {} - {}", e, text);
            }
        }
    }

    /// Route a correlated response to the caller waiting on its id
    fn handle_op_response(&self, resp: OpResponse) {
        match self.pending_ops.remove(&resp.id) {
            Some((_, tx)) => {
                let _ = tx.send(resp);
            }
            None => {
                warn!("op response for unknown request id {}", resp.id);
            }
        }
    }

    fn handle_event(&self, event: EventMessage) {
        match event.event.as_str() {
            "login" => {
                if event.is_success() {
                    self.login_gate.complete(true);
                    self.emit(ConnectionEvent::LoggedIn);
                } else {
                    self.login_gate.complete(false);
                    self.emit(ConnectionEvent::LoginFailed {
                        code: event.code.clone().unwrap_or_default(),
                        message: event.msg.clone().unwrap_or_default(),
                    });
                }
            }
            "subscribe" => {
                if let Some(arg) = event.arg {
                    self.emit(SubscriptionEvent::Subscribed {
                        channel: arg.channel,
                        inst_id: arg.inst_id,
                    });
                }
            }
            "unsubscribe" => {
                if let Some(arg) = event.arg {
                    self.emit(SubscriptionEvent::Unsubscribed {
                        channel: arg.channel,
                        inst_id: arg.inst_id,
                    });
                }
            }
            "error" => {
                let code = event.code.clone().unwrap_or_default();
                let message = event.msg.clone().unwrap_or_default();
                warn!("server error (code {}): {}", code, message);

                // A login rejection arrives as a generic error frame; if a
                // login wait is in flight it must be woken with failure.
                if self.login_gate.fail_if_waiting() {
                    self.emit(ConnectionEvent::LoginFailed {
                        code: code.clone(),
                        message: message.clone(),
                    });
                }
                self.emit(Event::Error { code, message });
            }
            other => {
                debug!("unhandled event type: {}", other);
            }
        }
    }

    /// Route a data frame through the channel-name parser table
    fn handle_data(&self, msg: DataMessage) {
        let Some(channel) = Channel::from_channel_name(&msg.arg.channel) else {
            debug!("data frame for unmodelled channel: {}", msg.arg.channel);
            return;
        };
        let inst_id = msg.arg.inst_id.clone().unwrap_or_default();

        match channel {
            Channel::Tickers => {
                self.emit_each::<Ticker>(&msg, |t| MarketEvent::Ticker(t).into());
            }
            Channel::Trades => {
                self.emit_each::<Trade>(&msg, |t| MarketEvent::Trade(t).into());
            }
            Channel::Books => {
                let action = BookAction::parse(msg.action.as_deref());
                self.emit_each::<BookData>(&msg, |data| {
                    MarketEvent::Book {
                        inst_id: inst_id.clone(),
                        action,
                        data,
                    }
                    .into()
                });
            }
            Channel::Candle(interval) => {
                self.emit_each::<Candle>(&msg, |candle| {
                    MarketEvent::Candle {
                        inst_id: inst_id.clone(),
                        interval,
                        candle,
                    }
                    .into()
                });
            }
            Channel::OpenInterest => {
                self.emit_each::<OpenInterest>(&msg, |o| MarketEvent::OpenInterest(o).into());
            }
            Channel::MarkPrice => {
                self.emit_each::<MarkPrice>(&msg, |m| MarketEvent::MarkPrice(m).into());
            }
            Channel::FundingRate => {
                self.emit_each::<FundingRate>(&msg, |f| MarketEvent::FundingRate(f).into());
            }
            Channel::Orders => {
                self.emit_each::<Order>(&msg, |o| PrivateEvent::Order(o).into());
            }
            Channel::Positions => {
                self.emit_each::<Position>(&msg, |p| PrivateEvent::Position(p).into());
            }
            Channel::Account => {
                self.emit_each::<AccountBalance>(&msg, |a| PrivateEvent::Account(a).into());
            }
            // Channel is non_exhaustive; from_channel_name only yields
            // the variants above today
            _ => {
                debug!("no parser for channel: {}", msg.arg.channel);
            }
        }
    }

    /// Parse and deliver each payload item, skipping malformed ones
    fn emit_each<T: DeserializeOwned>(&self, msg: &DataMessage, mut to_event: impl FnMut(T) -> Event) {
        for item in &msg.data {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(parsed) => self.emit(to_event(parsed)),
                Err(e) => {
                    warn!(
                        channel = %msg.arg.channel,
                        "skipping malformed payload item: {}",
                        e
                    );
                }
            }
        }
    }

    fn emit(&self, event: impl Into<Event>) {
        let _ = self.event_tx.send(event.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dispatcher() -> (MessageDispatcher, mpsc::UnboundedReceiver<Event>, PendingOps, Arc<LoginGate>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending: PendingOps = Arc::new(DashMap::new());
        let gate = Arc::new(LoginGate::new());
        let dispatcher = MessageDispatcher::new(tx, pending.clone(), gate.clone());
        (dispatcher, rx, pending, gate)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_pong_is_a_noop() {
        let (dispatcher, mut rx, _, _) = dispatcher();
        dispatcher.dispatch("pong");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let (dispatcher, mut rx, _, _) = dispatcher();
        dispatcher.dispatch("{not json");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_batch_fault_isolation() {
        // item 2 of 3 is malformed; items 1 and 3 must still be delivered
        let (dispatcher, mut rx, _, _) = dispatcher();
        let raw = r#"{
            "arg": {"channel": "trades", "instId": "BTC-USDT"},
            "data": [
                {"instId": "BTC-USDT", "tradeId": "1", "px": "100", "sz": "1", "side": "buy", "ts": "1"},
                {"instId": "BTC-USDT", "tradeId": "2", "px": {"bogus": true}, "sz": "1", "side": "buy", "ts": "2"},
                {"instId": "BTC-USDT", "tradeId": "3", "px": "102", "sz": "1", "side": "sell", "ts": "3"}
            ]
        }"#;
        dispatcher.dispatch(raw);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        let ids: Vec<String> = events
            .iter()
            .map(|e| match e {
                Event::Market(MarketEvent::Trade(t)) => t.trade_id.clone(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["1".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_book_action_routing() {
        let (dispatcher, mut rx, _, _) = dispatcher();
        let raw = r#"{
            "arg": {"channel": "books", "instId": "BTC-USDT"},
            "action": "update",
            "data": [{"asks": [["100", "1", "0", "1"]], "bids": [], "ts": "1"}]
        }"#;
        dispatcher.dispatch(raw);

        match drain(&mut rx).pop().unwrap() {
            Event::Market(MarketEvent::Book { inst_id, action, data }) => {
                assert_eq!(inst_id, "BTC-USDT");
                assert_eq!(action, BookAction::Update);
                assert_eq!(data.asks[0].price(), dec!(100));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_candle_interval_recovered_from_channel_name() {
        let (dispatcher, mut rx, _, _) = dispatcher();
        let raw = r#"{
            "arg": {"channel": "candle15m", "instId": "ETH-USDT"},
            "data": [["1597026383085","8533.02","8553.74","8527.17","8548.26","45247"]]
        }"#;
        dispatcher.dispatch(raw);

        match drain(&mut rx).pop().unwrap() {
            Event::Market(MarketEvent::Candle { interval, candle, .. }) => {
                assert_eq!(interval, okx_types::CandleInterval::M15);
                assert_eq!(candle.close, dec!(8548.26));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_op_response_completes_pending_request() {
        let (dispatcher, _rx, pending, _) = dispatcher();
        let (tx, mut rx) = oneshot::channel();
        pending.insert("1512".to_string(), tx);

        dispatcher.dispatch(r#"{"id":"1512","op":"order","code":"0","msg":"","data":[]}"#);

        let resp = rx.try_recv().unwrap();
        assert!(resp.is_success());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_login_success_wakes_gate() {
        let (dispatcher, mut rx, _, gate) = dispatcher();
        gate.arm();
        dispatcher.dispatch(r#"{"event":"login","code":"0","msg":""}"#);

        assert_eq!(gate.peek(), Some(true));
        assert!(matches!(
            drain(&mut rx).pop().unwrap(),
            Event::Connection(ConnectionEvent::LoggedIn)
        ));
    }

    #[test]
    fn test_login_rejection_arrives_as_error_frame() {
        let (dispatcher, mut rx, _, gate) = dispatcher();
        gate.arm();
        dispatcher.dispatch(r#"{"event":"error","code":"60009","msg":"Login failed"}"#);

        assert_eq!(gate.peek(), Some(false));
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Connection(ConnectionEvent::LoginFailed { .. }))));
    }

    #[test]
    fn test_error_frame_without_login_wait() {
        let (dispatcher, mut rx, _, gate) = dispatcher();
        dispatcher.dispatch(r#"{"event":"error","code":"60012","msg":"Illegal request"}"#);

        assert_eq!(gate.peek(), None);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Error { code, .. } if code == "60012"));
    }

    #[test]
    fn test_subscribe_ack() {
        let (dispatcher, mut rx, _, _) = dispatcher();
        dispatcher.dispatch(r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT"}}"#);

        match drain(&mut rx).pop().unwrap() {
            Event::Subscription(SubscriptionEvent::Subscribed { channel, inst_id }) => {
                assert_eq!(channel, "tickers");
                assert_eq!(inst_id.as_deref(), Some("BTC-USDT"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
