//! Connection lifecycle management
//!
//! One [`ConnectionManager`] owns exactly one [`Transport`] handle for
//! its whole lifetime and drives the connection state machine across
//! three cooperating tasks:
//!
//! - the **reader** task, single consumer of `Transport::recv`, feeding
//!   the dispatcher; on close or error it does the minimum possible -
//!   flip the state, stop the heartbeat, enqueue one reconnect request -
//!   and exits. Heavy teardown work on the reader's own context risks
//!   reentrant destruction of the link it is reading from.
//! - the **heartbeat** task, sleeping in small increments so shutdown
//!   stays responsive, sending a textual `ping` each interval.
//! - the **reconnection supervisor**, started once, which consumes
//!   reconnect requests from a capacity-1 channel (a second signal
//!   raised before the first is consumed coalesces) and performs the
//!   full cycle: cooldown, reconnect the same transport handle, restart
//!   the heartbeat, repeat the login handshake for private endpoints,
//!   and replay the subscription registry.
//!
//! `disconnect()` is exactly-once: it disables reconnection, stops all
//! three tasks and *joins* them before the transport is closed.

use dashmap::DashMap;
use okx_auth::{epoch_seconds, Credentials};
use okx_types::{
    LoginArgs, LoginRequest, OkxError, OkxResult, OpRequest, OpResponse, SubscribeRequest,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::dispatcher::{MessageDispatcher, PendingOps};
use crate::endpoint::Endpoint;
use crate::events::{ConnectionEvent, DisconnectReason, Event};
use crate::subscription::{replay_frames, SubscriptionKey, SubscriptionRegistry};
use crate::transport::Transport;

/// Sleep increment for the heartbeat loop
const HEARTBEAT_TICK: Duration = Duration::from_millis(250);

/// Path signed into the WebSocket login frame
const LOGIN_SIGN_PATH: &str = "/users/self/verify";

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Transport link is up
    Connected,
    /// Login frame sent, awaiting acknowledgement
    Authenticating,
    /// Login acknowledged
    Authenticated,
    /// Shutting down; terminal
    Closing,
}

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Endpoint category
    pub endpoint: Endpoint,
    /// Whether the supervisor reconnects after a lost link
    pub auto_reconnect: bool,
    /// Fixed wait before each reconnect attempt (constant; no backoff)
    pub reconnect_cooldown: Duration,
    /// Wait after a successful reconnect before replaying subscriptions
    pub stabilize_delay: Duration,
    /// Bound on the login acknowledgement wait
    pub login_timeout: Duration,
    /// Bound on correlated request/response operations
    pub request_timeout: Duration,
    /// Interval between keepalive pings
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Public,
            auto_reconnect: true,
            reconnect_cooldown: Duration::from_secs(3),
            stabilize_delay: Duration::from_millis(300),
            login_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(25),
        }
    }
}

impl ConnectionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    /// Set the fixed reconnect cooldown
    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.reconnect_cooldown = cooldown;
        self
    }

    /// Set the post-reconnect stabilization delay
    pub fn with_stabilize_delay(mut self, delay: Duration) -> Self {
        self.stabilize_delay = delay;
        self
    }

    /// Set the login wait bound
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the correlated request bound
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Snapshot of the supervisor's failure tracking, for external alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    /// Whether reconnection is still enabled
    pub enabled: bool,
    /// Reconnect attempts failed since the last success
    pub consecutive_failures: u32,
    /// When the current failure streak began
    pub first_failure_time: Option<SystemTime>,
}

/// One-shot login wait primitive
///
/// The connection side arms the gate before sending a login frame and
/// blocks on [`LoginGate::wait`]; the dispatcher completes it when the
/// acknowledgement (success or failure) arrives. The slot must be
/// explicitly re-armed before each login, so a stale result from a
/// previous connection can never satisfy a new wait.
#[derive(Debug)]
pub struct LoginGate {
    slot: watch::Sender<LoginWait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginWait {
    /// No login in flight
    Idle,
    /// Login frame sent, no acknowledgement yet
    Waiting,
    /// Acknowledgement arrived
    Done(bool),
}

impl LoginGate {
    /// Create an idle gate
    pub fn new() -> Self {
        let (slot, _) = watch::channel(LoginWait::Idle);
        Self { slot }
    }

    /// Clear any previous result; the next wait blocks for a fresh one
    pub fn arm(&self) {
        self.slot.send_replace(LoginWait::Waiting);
    }

    /// Record the login outcome and wake all waiters
    pub fn complete(&self, success: bool) {
        self.slot.send_replace(LoginWait::Done(success));
    }

    /// Record a failure only if a login is actually in flight
    ///
    /// Returns true if a waiter was woken. Used for generic error
    /// frames, which only mean "login rejected" while one is pending.
    pub fn fail_if_waiting(&self) -> bool {
        let mut failed = false;
        self.slot.send_if_modified(|state| {
            if *state == LoginWait::Waiting {
                *state = LoginWait::Done(false);
                failed = true;
                true
            } else {
                false
            }
        });
        failed
    }

    /// Current result, if the acknowledgement already arrived
    pub fn peek(&self) -> Option<bool> {
        match *self.slot.borrow() {
            LoginWait::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Block until the acknowledgement arrives or the timeout elapses
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.slot.subscribe();
        let resolved = async {
            loop {
                if let LoginWait::Done(result) = *rx.borrow_and_update() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, resolved)
            .await
            .unwrap_or(false)
    }
}

impl Default for LoginGate {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the manager and its tasks
struct Inner<T: Transport> {
    config: ConnectionConfig,
    credentials: Option<Credentials>,
    transport: T,
    state: RwLock<ConnectionState>,
    registry: SubscriptionRegistry,
    dispatcher: MessageDispatcher,
    event_tx: mpsc::UnboundedSender<Event>,
    pending_ops: PendingOps,
    login_gate: Arc<LoginGate>,
    /// Reconnect request handoff: reader produces, supervisor consumes
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: Mutex<Option<mpsc::Receiver<()>>>,
    /// Reconnection enabled; cleared permanently by disconnect()
    enabled: AtomicBool,
    /// Heartbeat task liveness flag
    heartbeat_running: AtomicBool,
    /// Exactly-once disconnect guard
    closed: AtomicBool,
    consecutive_failures: AtomicU32,
    first_failure: Mutex<Option<SystemTime>>,
    /// Last successful ping send (no pong deadline is tracked)
    last_ping: Mutex<Option<Instant>>,
    shutdown_tx: watch::Sender<bool>,
    op_counter: AtomicU64,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
    supervisor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Inner<T> {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: impl Into<Event>) {
        let _ = self.event_tx.send(event.into());
    }

    fn is_link_up(&self) -> bool {
        matches!(
            *self.state.read(),
            ConnectionState::Connected
                | ConnectionState::Authenticating
                | ConnectionState::Authenticated
        )
    }

    /// Completes when disconnect() has been requested
    async fn wait_shutdown(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    /// Sleep, returning false if shutdown or disable interrupts the wait
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.wait_shutdown() => false,
            _ = sleep(duration) => self.enabled.load(Ordering::SeqCst),
        }
    }

    /// Minimal close/failure handling, run on the reader's own context
    ///
    /// Everything heavier than flag flips belongs to the supervisor.
    fn on_link_down(&self, reason: DisconnectReason) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        warn!("link down: {:?}", reason);
        self.set_state(ConnectionState::Disconnected);
        self.heartbeat_running.store(false, Ordering::SeqCst);
        self.emit(ConnectionEvent::Disconnected { reason });
        if self.enabled.load(Ordering::SeqCst) {
            let _ = self.reconnect_tx.try_send(());
        }
    }

    fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        self.first_failure.lock().get_or_insert(SystemTime::now());
    }

    /// Build and send the signed login frame; does not block for the ack
    async fn send_login(&self) -> OkxResult<()> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(OkxError::CredentialsRequired)?;

        let timestamp = epoch_seconds();
        let sign = creds.sign(&timestamp, "GET", LOGIN_SIGN_PATH, "");
        let frame = LoginRequest::new(LoginArgs {
            api_key: creds.api_key().to_string(),
            passphrase: creds.passphrase().to_string(),
            timestamp,
            sign,
        });
        let json = serde_json::to_string(&frame).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;

        self.login_gate.arm();
        self.set_state(ConnectionState::Authenticating);
        self.transport
            .send(&json)
            .await
            .map_err(|e| OkxError::Transport(e.to_string()))
    }
}

/// Owns one transport and drives the connection state machine
pub struct ConnectionManager<T: Transport + 'static> {
    inner: Arc<Inner<T>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create a manager for a public endpoint
    pub fn new(config: ConnectionConfig, transport: T) -> Self {
        Self::build(config, None, transport)
    }

    /// Create a manager with credentials for private endpoints
    pub fn with_credentials(
        config: ConnectionConfig,
        credentials: Credentials,
        transport: T,
    ) -> Self {
        Self::build(config, Some(credentials), transport)
    }

    fn build(config: ConnectionConfig, credentials: Option<Credentials>, transport: T) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = watch::channel(false);
        let pending_ops: PendingOps = Arc::new(DashMap::new());
        let login_gate = Arc::new(LoginGate::new());
        let dispatcher =
            MessageDispatcher::new(event_tx.clone(), pending_ops.clone(), login_gate.clone());
        let enabled = config.auto_reconnect;

        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                transport,
                state: RwLock::new(ConnectionState::Disconnected),
                registry: SubscriptionRegistry::new(),
                dispatcher,
                event_tx,
                pending_ops,
                login_gate,
                reconnect_tx,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
                enabled: AtomicBool::new(enabled),
                heartbeat_running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                first_failure: Mutex::new(None),
                last_ping: Mutex::new(None),
                shutdown_tx,
                op_counter: AtomicU64::new(1),
                reader_handle: Mutex::new(None),
                heartbeat_handle: Mutex::new(None),
                supervisor_handle: Mutex::new(None),
            }),
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Check if the link is up (connected, possibly mid-login)
    pub fn is_connected(&self) -> bool {
        self.inner.is_link_up()
    }

    /// Snapshot the supervisor's failure tracking
    pub fn reconnect_state(&self) -> ReconnectState {
        ReconnectState {
            enabled: self.inner.enabled.load(Ordering::SeqCst),
            consecutive_failures: self.inner.consecutive_failures.load(Ordering::SeqCst),
            first_failure_time: *self.inner.first_failure.lock(),
        }
    }

    /// When the last keepalive ping was sent
    pub fn last_ping(&self) -> Option<Instant> {
        *self.inner.last_ping.lock()
    }

    /// Number of currently-desired subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Take the event receiver (can only be taken once)
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.event_rx.lock().take()
    }

    /// Connect and start the background tasks
    ///
    /// Returns after the transport handshake (bounded by the transport's
    /// own connect timeout) and, for private endpoints, after the login
    /// handshake completes or times out.
    pub async fn connect(&self) -> OkxResult<()> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(OkxError::ShuttingDown);
        }

        inner.set_state(ConnectionState::Connecting);
        if let Err(e) = inner.transport.connect().await {
            inner.set_state(ConnectionState::Disconnected);
            return Err(OkxError::ConnectionFailed {
                url: inner.transport.endpoint().to_string(),
                reason: e.to_string(),
            });
        }

        inner.set_state(ConnectionState::Connected);
        info!("connected to {}", inner.transport.endpoint());
        inner.emit(ConnectionEvent::Connected {
            endpoint: inner.transport.endpoint().to_string(),
        });

        spawn_reader(inner);
        spawn_heartbeat(inner);

        if inner.config.auto_reconnect {
            let mut guard = inner.supervisor_handle.lock();
            if guard.is_none() {
                if let Some(requests) = inner.reconnect_rx.lock().take() {
                    let task_inner = inner.clone();
                    *guard = Some(tokio::spawn(supervisor_loop(task_inner, requests)));
                }
            }
        }

        if inner.config.endpoint.requires_auth() && inner.credentials.is_some() {
            inner.send_login().await?;
            if !inner.login_gate.wait(inner.config.login_timeout).await {
                return match inner.login_gate.peek() {
                    Some(false) => Err(OkxError::LoginFailed {
                        code: String::new(),
                        message: "login rejected by server".to_string(),
                    }),
                    _ => Err(OkxError::LoginTimeout {
                        timeout: inner.config.login_timeout,
                    }),
                };
            }
            inner.set_state(ConnectionState::Authenticated);
        }

        Ok(())
    }

    /// Send the signed login frame without blocking for the ack
    pub async fn login(&self) -> OkxResult<()> {
        self.inner.send_login().await
    }

    /// Block until the login acknowledgement arrives or `timeout` elapses
    pub async fn wait_for_login(&self, timeout: Duration) -> bool {
        let ok = self.inner.login_gate.wait(timeout).await;
        if ok {
            self.inner.set_state(ConnectionState::Authenticated);
        }
        ok
    }

    /// Subscribe to a channel and record it for replay after reconnects
    pub async fn subscribe(&self, key: SubscriptionKey) -> OkxResult<()> {
        let frame = SubscribeRequest::subscribe(vec![key.to_arg()]);
        let json = serde_json::to_string(&frame).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        debug!("subscribing: {}", json);
        self.inner
            .transport
            .send(&json)
            .await
            .map_err(|e| OkxError::Transport(e.to_string()))?;
        self.inner.registry.add(key);
        Ok(())
    }

    /// Unsubscribe from a channel and drop it from the replay set
    pub async fn unsubscribe(&self, key: &SubscriptionKey) -> OkxResult<()> {
        self.inner.registry.remove(key);
        let frame = SubscribeRequest::unsubscribe(vec![key.to_arg()]);
        let json = serde_json::to_string(&frame).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        debug!("unsubscribing: {}", json);
        self.inner
            .transport
            .send(&json)
            .await
            .map_err(|e| OkxError::Transport(e.to_string()))
    }

    /// Send a correlated operation and await its response
    ///
    /// The request id is allocated from an internal counter and echoed
    /// back by the server; the dispatcher completes the wait.
    pub async fn submit_op(
        &self,
        op: impl Into<String>,
        args: serde_json::Value,
    ) -> OkxResult<OpResponse> {
        let inner = &self.inner;
        let id = inner.op_counter.fetch_add(1, Ordering::SeqCst).to_string();
        let request = OpRequest {
            id: id.clone(),
            op: op.into(),
            args,
        };
        let json = serde_json::to_string(&request).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;

        let (tx, rx) = oneshot::channel();
        inner.pending_ops.insert(id.clone(), tx);

        if let Err(e) = inner.transport.send(&json).await {
            inner.pending_ops.remove(&id);
            return Err(OkxError::Transport(e.to_string()));
        }

        match tokio::time::timeout(inner.config.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(OkxError::ChannelClosed),
            Err(_) => {
                inner.pending_ops.remove(&id);
                Err(OkxError::RequestTimeout {
                    id,
                    timeout: inner.config.request_timeout,
                })
            }
        }
    }

    /// Shut down permanently
    ///
    /// Exactly-once: the first call disables reconnection, stops all
    /// tasks and joins them before closing the transport; redundant
    /// calls return immediately with no effect. The join-before-close
    /// ordering is mandatory - a task still running here could send
    /// into a transport being torn down.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        if inner
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!("disconnecting");
        inner.set_state(ConnectionState::Closing);
        inner.enabled.store(false, Ordering::SeqCst);
        inner.heartbeat_running.store(false, Ordering::SeqCst);
        let _ = inner.shutdown_tx.send(true);

        let reader = inner.reader_handle.lock().take();
        let heartbeat = inner.heartbeat_handle.lock().take();
        let supervisor = inner.supervisor_handle.lock().take();
        if let Some(handle) = reader {
            let _ = handle.await;
        }
        if let Some(handle) = heartbeat {
            let _ = handle.await;
        }
        if let Some(handle) = supervisor {
            let _ = handle.await;
        }

        inner.pending_ops.clear();
        inner.registry.clear();
        if let Err(e) = inner.transport.close().await {
            debug!("transport close: {}", e);
        }
    }
}

/// Spawn the reader task, storing its handle for join-on-disconnect
fn spawn_reader<T: Transport + 'static>(inner: &Arc<Inner<T>>) {
    let task_inner = inner.clone();
    let handle = tokio::spawn(async move {
        reader_loop(task_inner).await;
    });
    *inner.reader_handle.lock() = Some(handle);
}

/// Spawn the heartbeat task, storing its handle for join-on-disconnect
fn spawn_heartbeat<T: Transport + 'static>(inner: &Arc<Inner<T>>) {
    inner.heartbeat_running.store(true, Ordering::SeqCst);
    let task_inner = inner.clone();
    let handle = tokio::spawn(async move {
        heartbeat_loop(task_inner).await;
    });
    *inner.heartbeat_handle.lock() = Some(handle);
}

/// Single consumer of inbound frames; exits on close or shutdown
async fn reader_loop<T: Transport + 'static>(inner: Arc<Inner<T>>) {
    loop {
        tokio::select! {
            _ = inner.wait_shutdown() => break,
            received = inner.transport.recv() => match received {
                Ok(Some(text)) => inner.dispatcher.dispatch(&text),
                Ok(None) => {
                    inner.on_link_down(DisconnectReason::ServerClosed);
                    break;
                }
                Err(e) => {
                    inner.on_link_down(DisconnectReason::NetworkError(e.to_string()));
                    break;
                }
            }
        }
    }
}

/// Periodic keepalive; sleeps in small increments so shutdown is prompt
async fn heartbeat_loop<T: Transport + 'static>(inner: Arc<Inner<T>>) {
    let mut elapsed = Duration::ZERO;
    while inner.heartbeat_running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = inner.wait_shutdown() => break,
            _ = sleep(HEARTBEAT_TICK) => {}
        }
        if !inner.heartbeat_running.load(Ordering::SeqCst) {
            break;
        }
        elapsed += HEARTBEAT_TICK;
        if elapsed < inner.config.heartbeat_interval {
            continue;
        }
        elapsed = Duration::ZERO;
        if !inner.is_link_up() {
            continue;
        }
        match inner.transport.send("ping").await {
            Ok(()) => {
                *inner.last_ping.lock() = Some(Instant::now());
                debug!("heartbeat ping sent");
            }
            Err(e) => warn!("heartbeat send failed: {}", e),
        }
    }
}

/// Consumes reconnect requests and performs the full reconnect cycle
async fn supervisor_loop<T: Transport + 'static>(
    inner: Arc<Inner<T>>,
    mut requests: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = inner.wait_shutdown() => break,
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
                if !inner.enabled.load(Ordering::SeqCst) {
                    continue;
                }
                reconnect_cycle(&inner).await;
            }
        }
    }
}

/// One pass of the reconnect sequence
///
/// Re-checks "still enabled" between steps so a disconnect mid-cycle
/// terminates the sequence instead of completing a connect into a
/// handle about to be destroyed.
async fn reconnect_cycle<T: Transport + 'static>(inner: &Arc<Inner<T>>) {
    let attempt = inner.consecutive_failures.load(Ordering::SeqCst) + 1;
    info!("reconnect attempt {}", attempt);
    inner.emit(ConnectionEvent::Reconnecting { attempt });

    // Quiesce the previous reader and heartbeat before touching the
    // transport, so no stale task fires mid-transition.
    let old_reader = inner.reader_handle.lock().take();
    if let Some(handle) = old_reader {
        let _ = handle.await;
    }
    let old_heartbeat = inner.heartbeat_handle.lock().take();
    if let Some(handle) = old_heartbeat {
        let _ = handle.await;
    }

    // Fixed cooldown lets the OS release the underlying socket. The
    // interval is a constant: retries repeat at this same pace.
    if !inner.pause(inner.config.reconnect_cooldown).await {
        return;
    }

    inner.set_state(ConnectionState::Connecting);
    if let Err(e) = inner.transport.connect().await {
        warn!("reconnect failed: {}", e);
        inner.record_failure();
        inner.set_state(ConnectionState::Disconnected);
        // Requeue so the supervisor retries on its next pass
        let _ = inner.reconnect_tx.try_send(());
        return;
    }

    inner.consecutive_failures.store(0, Ordering::SeqCst);
    *inner.first_failure.lock() = None;
    inner.set_state(ConnectionState::Connected);
    info!("reconnected to {}", inner.transport.endpoint());
    inner.emit(ConnectionEvent::Connected {
        endpoint: inner.transport.endpoint().to_string(),
    });

    // Brief wait for the link to stabilize before driving traffic
    if !inner.pause(inner.config.stabilize_delay).await {
        return;
    }

    spawn_reader(inner);
    spawn_heartbeat(inner);

    if inner.config.endpoint.requires_auth() && inner.credentials.is_some() {
        match inner.send_login().await {
            Ok(()) => {
                if inner.login_gate.wait(inner.config.login_timeout).await {
                    inner.set_state(ConnectionState::Authenticated);
                } else {
                    warn!("no login acknowledgement after reconnect");
                }
            }
            Err(e) => warn!("re-login after reconnect failed: {}", e),
        }
    }

    if !inner.enabled.load(Ordering::SeqCst) {
        return;
    }
    replay_subscriptions(inner).await;
}

/// Snapshot the registry, then reissue subscribe frames outside the lock
async fn replay_subscriptions<T: Transport + 'static>(inner: &Arc<Inner<T>>) {
    let keys = inner.registry.snapshot();
    if keys.is_empty() {
        return;
    }
    let frames = replay_frames(&keys);
    for frame in &frames {
        if !inner.enabled.load(Ordering::SeqCst) {
            return;
        }
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                error!("could not encode replay frame: {}", e);
                continue;
            }
        };
        debug!("replaying subscriptions: {}", json);
        if let Err(e) = inner.transport.send(&json).await {
            // The reader will see the dead link and request another cycle
            warn!("subscription replay interrupted: {}", e);
            return;
        }
    }
    info!(
        "restored {} subscriptions in {} frames",
        keys.len(),
        frames.len()
    );
    inner.emit(ConnectionEvent::SubscriptionsRestored { count: keys.len() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn test_config() -> ConnectionConfig {
        ConnectionConfig::new()
            .with_reconnect_cooldown(Duration::from_millis(10))
            .with_stabilize_delay(Duration::from_millis(10))
            .with_login_timeout(Duration::from_secs(1))
            .with_request_timeout(Duration::from_millis(500))
    }

    fn credentials() -> Credentials {
        Credentials::new("test_key", "test_secret", "test_phrase")
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_connection_config_builders() {
        let config = ConnectionConfig::new()
            .with_endpoint(Endpoint::Private)
            .with_heartbeat_interval(Duration::from_secs(15))
            .without_reconnect();
        assert_eq!(config.endpoint, Endpoint::Private);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert!(!config.auto_reconnect);
    }

    #[tokio::test]
    async fn test_initial_state() {
        let manager = ConnectionManager::new(test_config(), MockTransport::new("wss://mock"));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
        assert_eq!(manager.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_error() {
        let transport = MockTransport::new("wss://mock");
        transport.set_fail_connect(true);
        let manager = ConnectionManager::new(test_config(), transport);

        let result = manager.connect().await;
        assert!(matches!(result, Err(OkxError::ConnectionFailed { .. })));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_exactly_once_disconnect() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        assert!(manager.is_connected());

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Closing);
        assert_eq!(observer.close_count(), 1);

        // Redundant calls are no-ops: no double release
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(observer.close_count(), 1);
        assert!(!manager.reconnect_state().enabled);
    }

    #[tokio::test]
    async fn test_subscribe_records_and_sends() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        manager
            .subscribe(SubscriptionKey::ticker("BTC-USDT"))
            .await
            .unwrap();

        assert_eq!(manager.subscription_count(), 1);
        let frames = observer.sent_frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""op":"subscribe""#));
        assert!(frames[0].contains(r#""instId":"BTC-USDT""#));

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_key() {
        let transport = MockTransport::new("wss://mock");
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        let key = SubscriptionKey::ticker("BTC-USDT");
        manager.subscribe(key.clone()).await.unwrap();
        manager.unsubscribe(&key).await.unwrap();
        assert_eq!(manager.subscription_count(), 0);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_reconnect_replays_ticker_subscription() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        manager
            .subscribe(SubscriptionKey::ticker("BTC-USDT"))
            .await
            .unwrap();

        // Simulate a server-side close; the supervisor must reconnect
        // and replay the subscription.
        observer.push_close();

        assert!(
            wait_until(|| observer.connect_count() == 2).await,
            "supervisor never reconnected"
        );
        assert!(
            wait_until(|| {
                observer
                    .sent_frames()
                    .iter()
                    .filter(|f| f.contains(r#""channel":"tickers""#))
                    .count()
                    == 2
            })
            .await,
            "subscription was not replayed"
        );

        // Exactly one replay frame for the one registered key
        let replayed: Vec<String> = observer
            .sent_frames()
            .iter()
            .filter(|f| f.contains("tickers"))
            .cloned()
            .collect();
        assert_eq!(replayed.len(), 2);
        assert!(replayed[1].contains(r#""instId":"BTC-USDT""#));

        assert_eq!(manager.reconnect_state().consecutive_failures, 0);
        assert!(manager.is_connected());

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_reconnect_failure_counting_and_recovery() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();

        observer.set_fail_connect(true);
        observer.push_close();

        assert!(
            wait_until(|| manager.reconnect_state().consecutive_failures >= 2).await,
            "failures were not counted"
        );
        let state = manager.reconnect_state();
        assert!(state.first_failure_time.is_some());
        assert!(state.enabled);

        // Let the next attempt succeed: counters must reset
        observer.set_fail_connect(false);
        assert!(
            wait_until(|| manager.reconnect_state().consecutive_failures == 0).await,
            "failure count was not reset after recovery"
        );
        assert!(manager.reconnect_state().first_failure_time.is_none());

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_stops_reconnection() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        manager.disconnect().await;

        let connects_after_close = observer.connect_count();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(observer.connect_count(), connects_after_close);
    }

    #[tokio::test]
    async fn test_login_timeout_returns_false_in_bounded_time() {
        let transport = MockTransport::new("wss://mock");
        let manager =
            ConnectionManager::with_credentials(test_config(), credentials(), transport);

        manager.connect().await.unwrap();
        manager.login().await.unwrap();

        let started = Instant::now();
        let ok = manager.wait_for_login(Duration::from_millis(50)).await;
        let elapsed = started.elapsed();

        assert!(!ok);
        assert!(elapsed >= Duration::from_millis(45), "returned too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "returned too late: {:?}", elapsed);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_login_ack_completes_wait() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager =
            ConnectionManager::with_credentials(test_config(), credentials(), transport);

        manager.connect().await.unwrap();
        manager.login().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Authenticating);

        // The login frame must carry the signed fields
        let login_frame = observer
            .sent_frames()
            .into_iter()
            .find(|f| f.contains(r#""op":"login""#))
            .expect("no login frame sent");
        assert!(login_frame.contains(r#""apiKey":"test_key""#));
        assert!(login_frame.contains(r#""sign":""#));

        observer.push_frame(r#"{"event":"login","code":"0","msg":""}"#);
        assert!(manager.wait_for_login(Duration::from_secs(1)).await);
        assert_eq!(manager.state(), ConnectionState::Authenticated);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_private_endpoint_connect_performs_login() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let config = test_config().with_endpoint(Endpoint::Private);
        let manager = ConnectionManager::with_credentials(config, credentials(), transport);

        let pusher = async {
            assert!(
                wait_until(|| {
                    observer
                        .sent_frames()
                        .iter()
                        .any(|f| f.contains(r#""op":"login""#))
                })
                .await
            );
            observer.push_frame(r#"{"event":"login","code":"0","msg":""}"#);
        };

        let (connect_result, ()) = tokio::join!(manager.connect(), pusher);
        connect_result.unwrap();
        assert_eq!(manager.state(), ConnectionState::Authenticated);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_submit_op_round_trip() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();

        let pusher = async {
            assert!(
                wait_until(|| {
                    observer
                        .sent_frames()
                        .iter()
                        .any(|f| f.contains(r#""op":"order""#))
                })
                .await
            );
            observer.push_frame(r#"{"id":"1","op":"order","code":"0","msg":"","data":[]}"#);
        };

        let (result, ()) = tokio::join!(
            manager.submit_op("order", serde_json::json!([{"instId": "BTC-USDT"}])),
            pusher
        );
        let resp = result.unwrap();
        assert_eq!(resp.id, "1");
        assert!(resp.is_success());

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_submit_op_times_out_without_response() {
        let transport = MockTransport::new("wss://mock");
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        let result = manager.submit_op("order", serde_json::json!([])).await;
        assert!(matches!(result, Err(OkxError::RequestTimeout { .. })));

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_heartbeat_sends_ping() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let config = test_config().with_heartbeat_interval(Duration::from_millis(300));
        let manager = ConnectionManager::new(config, transport);

        manager.connect().await.unwrap();
        assert!(
            wait_until(|| observer.sent_frames().iter().any(|f| f == "ping")).await,
            "heartbeat never pinged"
        );
        assert!(manager.last_ping().is_some());

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_registry_survives_reconnect_but_not_disconnect() {
        let transport = MockTransport::new("wss://mock");
        let observer = transport.clone();
        let manager = ConnectionManager::new(test_config(), transport);

        manager.connect().await.unwrap();
        manager
            .subscribe(SubscriptionKey::ticker("BTC-USDT"))
            .await
            .unwrap();

        observer.push_close();
        assert!(wait_until(|| observer.connect_count() == 2).await);
        assert_eq!(manager.subscription_count(), 1);

        manager.disconnect().await;
        assert_eq!(manager.subscription_count(), 0);
    }
}
