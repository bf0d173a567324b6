//! Integration tests against the live OKX public endpoint
//!
//! These tests make real WebSocket connections and are ignored by
//! default. Run with:
//! cargo test -p okx-ws --test integration_tests -- --ignored

use okx_ws::{
    ConnectionConfig, ConnectionManager, ConnectionEvent, Endpoint, Event, MarketEvent,
    SubscriptionEvent, SubscriptionKey, WsTransport,
};
use std::time::Duration;
use tokio::time::timeout;

fn live_manager() -> ConnectionManager<WsTransport> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let config = ConnectionConfig::new().with_endpoint(Endpoint::Public);
    let transport = WsTransport::new(config.endpoint.url());
    ConnectionManager::new(config, transport)
}

/// Test that we can establish a WebSocket connection
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_ws_connection() {
    let manager = live_manager();
    let mut events = manager.take_event_receiver().expect("Should have receiver");

    manager.connect().await.expect("Should connect");

    let connected = timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            if let Event::Connection(ConnectionEvent::Connected { .. }) = event {
                return true;
            }
        }
        false
    })
    .await;

    assert!(connected.unwrap_or(false), "Should have connected");
    manager.disconnect().await;
}

/// Test subscribing to the tickers channel
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_ticker_subscription() {
    let manager = live_manager();
    let mut events = manager.take_event_receiver().expect("Should have receiver");

    manager.connect().await.expect("Should connect");
    manager
        .subscribe(SubscriptionKey::ticker("BTC-USDT"))
        .await
        .expect("Should send subscribe");

    let mut ack = false;
    let mut data = false;
    let result = timeout(Duration::from_secs(30), async {
        while let Some(event) = events.recv().await {
            match event {
                Event::Subscription(SubscriptionEvent::Subscribed { channel, .. }) => {
                    if channel == "tickers" {
                        ack = true;
                    }
                }
                Event::Market(MarketEvent::Ticker(ticker)) => {
                    assert_eq!(ticker.inst_id, "BTC-USDT");
                    data = true;
                }
                _ => {}
            }
            if ack && data {
                break;
            }
        }
    })
    .await;

    assert!(result.is_ok(), "Timed out waiting for ticker data");
    assert!(ack, "Should have received subscription ack");
    assert!(data, "Should have received ticker data");

    manager.disconnect().await;
}

/// Test subscribing to the orderbook channel
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_orderbook_subscription() {
    let manager = live_manager();
    let mut events = manager.take_event_receiver().expect("Should have receiver");

    manager.connect().await.expect("Should connect");
    manager
        .subscribe(SubscriptionKey::books("BTC-USDT"))
        .await
        .expect("Should send subscribe");

    let mut snapshot = false;
    let result = timeout(Duration::from_secs(30), async {
        while let Some(event) = events.recv().await {
            if let Event::Market(MarketEvent::Book { inst_id, data, .. }) = event {
                assert_eq!(inst_id, "BTC-USDT");
                assert!(!data.bids.is_empty() || !data.asks.is_empty());
                snapshot = true;
                break;
            }
        }
    })
    .await;

    assert!(result.is_ok(), "Timed out waiting for orderbook");
    assert!(snapshot, "Should have received orderbook data");

    manager.disconnect().await;
}

/// Test subscribing to multiple channels at once
#[tokio::test]
#[ignore = "Makes real WebSocket connection"]
async fn test_multiple_channel_subscription() {
    let manager = live_manager();
    let mut events = manager.take_event_receiver().expect("Should have receiver");

    manager.connect().await.expect("Should connect");
    manager
        .subscribe(SubscriptionKey::ticker("BTC-USDT"))
        .await
        .expect("Should send subscribe");
    manager
        .subscribe(SubscriptionKey::trades("BTC-USDT"))
        .await
        .expect("Should send subscribe");

    let mut ticker = false;
    let mut trade = false;
    let _ = timeout(Duration::from_secs(30), async {
        while let Some(event) = events.recv().await {
            match event {
                Event::Market(MarketEvent::Ticker(_)) => ticker = true,
                Event::Market(MarketEvent::Trade(_)) => trade = true,
                _ => {}
            }
            if ticker && trade {
                break;
            }
        }
    })
    .await;

    println!("Received ticker: {}, trade: {}", ticker, trade);
    assert!(ticker, "Should have received ticker data");

    manager.disconnect().await;
}
