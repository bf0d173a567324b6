//! WebSocket transport abstraction
//!
//! This module provides a trait-based abstraction over WebSocket
//! connections, enabling unit testing of connection logic without real
//! network calls. All methods take `&self` so that the reader task, the
//! heartbeat task and the reconnection supervisor can share one handle;
//! implementations use interior mutability.
//!
//! The connection manager owns exactly one transport for its lifetime.
//! Calling [`Transport::connect`] on a handle that was connected before
//! must discard any stale internal stream state rather than allocate a
//! second concurrent connection.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Trait for WebSocket transport abstraction
///
/// Failures are surfaced as error values through `recv`, never as
/// panics: a graceful server close is `Ok(None)`, everything else is a
/// `TransportError` the caller turns into a reconnect request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the endpoint, discarding any stale internal state
    async fn connect(&self) -> Result<(), TransportError>;

    /// Send a text frame
    async fn send(&self, message: &str) -> Result<(), TransportError>;

    /// Receive the next text frame
    ///
    /// Returns `Ok(None)` if the connection was closed gracefully.
    async fn recv(&self) -> Result<Option<String>, TransportError>;

    /// Close the connection gracefully
    async fn close(&self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get the endpoint URL
    fn endpoint(&self) -> &str;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Real WebSocket transport using tokio-tungstenite
///
/// The sink and stream halves live behind separate async mutexes so a
/// blocked `recv` never starves `send`.
pub struct WsTransport {
    url: String,
    connect_timeout: Duration,
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<WsSource>>,
    connected: AtomicBool,
}

impl WsTransport {
    /// Create a new WebSocket transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<(), TransportError> {
        debug!("Connecting to WebSocket");

        // Drop stale halves from a previous connection first
        self.connected.store(false, Ordering::SeqCst);
        self.writer.lock().await.take();
        self.reader.lock().await.take();

        let connect_future = connect_async(&self.url);
        let (ws_stream, _response) = timeout(self.connect_timeout, connect_future)
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, stream) = ws_stream.split();
        *self.writer.lock().await = Some(sink);
        *self.reader.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);

        debug!("WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn send(&self, message: &str) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        sink.send(Message::Text(message.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        loop {
            let next = {
                let mut guard = self.reader.lock().await;
                let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
                stream.next().await
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Ping(data))) => {
                    // Reply at the protocol level and keep waiting
                    let mut guard = self.writer.lock().await;
                    if let Some(sink) = guard.as_mut() {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.reader.lock().await.take();
        if let Some(mut sink) = self.writer.lock().await.take() {
            sink.close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Mock transport for testing
///
/// Allows scripting received frames and capturing sent messages. The
/// handle is cheaply cloneable and clones share state, so a test can
/// keep one clone while the connection manager drives the other.
///
/// Unlike the real transport, `recv` on an empty script queue waits
/// until a frame is pushed - a quiet connection stays "up".
#[cfg(any(test, feature = "test-utils"))]
pub struct MockTransport {
    inner: std::sync::Arc<MockState>,
}

#[cfg(any(test, feature = "test-utils"))]
struct MockState {
    url: String,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    connect_count: std::sync::atomic::AtomicU32,
    close_count: std::sync::atomic::AtomicU32,
    sent: parking_lot::Mutex<Vec<String>>,
    script: parking_lot::Mutex<std::collections::VecDeque<Result<Option<String>, TransportError>>>,
    wakeup: tokio::sync::Notify,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create a new mock transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: std::sync::Arc::new(MockState {
                url: url.into(),
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                connect_count: std::sync::atomic::AtomicU32::new(0),
                close_count: std::sync::atomic::AtomicU32::new(0),
                sent: parking_lot::Mutex::new(Vec::new()),
                script: parking_lot::Mutex::new(std::collections::VecDeque::new()),
                wakeup: tokio::sync::Notify::new(),
            }),
        }
    }

    /// Queue a frame to be returned by `recv`
    pub fn push_frame(&self, msg: impl Into<String>) {
        self.inner.script.lock().push_back(Ok(Some(msg.into())));
        self.inner.wakeup.notify_one();
    }

    /// Queue a graceful close
    pub fn push_close(&self) {
        self.inner.script.lock().push_back(Ok(None));
        self.inner.wakeup.notify_one();
    }

    /// Queue a receive error
    pub fn push_error(&self, error: TransportError) {
        self.inner.script.lock().push_back(Err(error));
        self.inner.wakeup.notify_one();
    }

    /// Make subsequent `connect` calls fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Frames captured from `send`
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner.sent.lock().clone()
    }

    /// Number of `connect` calls so far
    pub fn connect_count(&self) -> u32 {
        self.inner.connect_count.load(Ordering::SeqCst)
    }

    /// Number of `close` calls so far
    pub fn close_count(&self) -> u32 {
        self.inner.close_count.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.inner.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "mock connection failure".into(),
            ));
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, message: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.inner.sent.lock().push(message.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        loop {
            if !self.is_connected() {
                return Err(TransportError::NotConnected);
            }
            if let Some(item) = self.inner.script.lock().pop_front() {
                if matches!(&item, Ok(None) | Err(_)) {
                    self.inner.connected.store(false, Ordering::SeqCst);
                }
                return item;
            }
            self.inner.wakeup.notified().await;
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.close_count.fetch_add(1, Ordering::SeqCst);
        self.inner.wakeup.notify_waiters();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> &str {
        &self.inner.url
    }
}
