//! WebSocket engine: a [`ChainConnection`] over tokio-tungstenite.
//!
//! The engine spawns a tokio task that owns the socket and handles:
//!
//! - Connecting, and reconnecting with exponential backoff
//! - Outgoing JSON-RPC requests from the Rust API
//! - Request/response correlation by numeric id
//! - Routing subscription notifications to their streams
//! - State transitions reported to the delegate
//!
//! Dropping the last handle to the engine closes its command channel, which
//! stops the task and closes the socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Value, from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Incoming, Request, subscription_key};

use super::connection::{ChainConnection, ConnectionDelegate, ConnectionState, SubscriptionStream};
use super::options::EngineOptions;

// ============================================================================
// Constants
// ============================================================================

/// Maximum subscriptions with notifications waiting for a receiver.
const MAX_ORPHAN_SUBSCRIPTIONS: usize = 64;

/// Maximum buffered notifications per waiting subscription.
const MAX_ORPHAN_VALUES: usize = 16;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsSink = SplitSink<WsStream, Message>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<u64, oneshot::Sender<Result<Value>>>;

/// Requests waiting for a socket.
type Outbox = Vec<(Request, oneshot::Sender<Result<Value>>)>;

// ============================================================================
// EngineCommand
// ============================================================================

/// Internal commands for the event loop.
enum EngineCommand {
    Connect,
    Disconnect,
    Reconnect(Url),
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    RemoveCorrelation(u64),
}

/// What the event loop should do after a phase ends.
enum Control {
    Continue,
    Connect,
    Disconnect,
    Reconnect(Url),
    Dropped,
}

enum ConnectOutcome {
    Connected(Box<WsStream>),
    Failed,
    Interrupted(Control),
}

// ============================================================================
// SubscriptionTable
// ============================================================================

/// Routes notifications to subscription streams.
///
/// A notification can arrive before the subscriber registers its stream,
/// so unmatched values are parked briefly and replayed on registration.
/// Values for a stream its receiver already dropped are discarded.
#[derive(Default)]
struct SubscriptionTable {
    senders: FxHashMap<String, mpsc::UnboundedSender<Value>>,
    orphans: FxHashMap<String, Vec<Value>>,
    closed: FxHashSet<String>,
}

impl SubscriptionTable {
    fn register(&mut self, key: String, tx: mpsc::UnboundedSender<Value>) {
        if let Some(values) = self.orphans.remove(&key) {
            for value in values {
                let _ = tx.send(value);
            }
        }
        self.closed.remove(&key);
        self.senders.insert(key, tx);
    }

    fn route(&mut self, key: String, value: Value) {
        if self.closed.contains(&key) {
            trace!(subscription = %key, "Dropping notification for closed subscription");
            return;
        }

        if let Some(tx) = self.senders.get(&key) {
            if tx.send(value).is_err() {
                self.senders.remove(&key);
                self.closed.insert(key);
            }
            return;
        }

        if !self.orphans.contains_key(&key) && self.orphans.len() >= MAX_ORPHAN_SUBSCRIPTIONS {
            trace!(subscription = %key, "Dropping notification for unknown subscription");
            return;
        }

        let values = self.orphans.entry(key).or_default();
        if values.len() < MAX_ORPHAN_VALUES {
            values.push(value);
        }
    }

    fn clear(&mut self) {
        self.senders.clear();
        self.orphans.clear();
        self.closed.clear();
    }
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the engine handle and its event loop.
struct Shared {
    name: String,
    url: RwLock<Url>,
    state: Mutex<ConnectionState>,
    delegate: RwLock<Option<Weak<dyn ConnectionDelegate>>>,
    correlation: Mutex<CorrelationMap>,
    subscriptions: Mutex<SubscriptionTable>,
}

impl Shared {
    fn url(&self) -> Url {
        self.url.read().clone()
    }

    fn set_url(&self, url: Url) {
        *self.url.write() = url;
    }

    /// Moves to `to` and notifies the delegate outside of any lock.
    fn transition(&self, to: ConnectionState) {
        let from = {
            let mut state = self.state.lock();
            if *state == to {
                return;
            }
            std::mem::replace(&mut *state, to)
        };

        let url = self.url();
        debug!(name = %self.name, url = %url, %from, %to, "Connection state changed");

        let delegate = self.delegate.read().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            delegate.connection_did_change_state(&url, from, to);
        }
    }

    /// Fails all in-flight requests with `ConnectionClosed`.
    fn fail_pending(&self) {
        let pending: Vec<_> = self.correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(name = %self.name, count, "Failed pending requests");
        }
    }
}

// ============================================================================
// WebSocketEngine
// ============================================================================

/// JSON-RPC over WebSocket connection to a chain node.
///
/// Created through [`super::WebSocketConnectionFactory`] or [`Self::new`].
/// Must be created inside a Tokio runtime.
///
/// # Thread Safety
///
/// `WebSocketEngine` is `Send + Sync`. Control methods only enqueue
/// commands for the event loop and never block.
pub struct WebSocketEngine {
    shared: Arc<Shared>,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    next_id: AtomicU64,
    options: EngineOptions,
}

impl WebSocketEngine {
    /// Creates an engine bound to `url` and starts connecting.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url: Url,
        delegate: Option<Weak<dyn ConnectionDelegate>>,
        options: EngineOptions,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            name: name.into(),
            url: RwLock::new(url),
            state: Mutex::new(ConnectionState::NotConnected),
            delegate: RwLock::new(delegate),
            correlation: Mutex::new(CorrelationMap::default()),
            subscriptions: Mutex::new(SubscriptionTable::default()),
        });

        tokio::spawn(Self::run_event_loop(
            Arc::clone(&shared),
            command_rx,
            options.clone(),
        ));

        Self {
            shared,
            command_tx,
            next_id: AtomicU64::new(1),
            options,
        }
    }

    /// Returns the number of in-flight requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.correlation.lock().len()
    }

    fn send_command(&self, command: EngineCommand) {
        if self.command_tx.send(command).is_err() {
            debug!(name = %self.shared.name, "Event loop already terminated");
        }
    }
}

// ============================================================================
// WebSocketEngine - ChainConnection
// ============================================================================

#[async_trait]
impl ChainConnection for WebSocketEngine {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn url(&self) -> Url {
        self.shared.url()
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    fn connect_if_needed(&self) {
        self.send_command(EngineCommand::Connect);
    }

    fn disconnect_if_needed(&self) {
        self.send_command(EngineCommand::Disconnect);
    }

    fn reconnect(&self, url: Url) {
        self.send_command(EngineCommand::Reconnect(url));
    }

    fn delegate(&self) -> Option<Weak<dyn ConnectionDelegate>> {
        self.shared.delegate.read().clone()
    }

    fn set_delegate(&self, delegate: Option<Weak<dyn ConnectionDelegate>>) {
        *self.shared.delegate.write() = delegate;
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let pending = self.shared.correlation.lock().len();
            if pending >= self.options.max_pending_requests {
                warn!(
                    pending,
                    max = self.options.max_pending_requests,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    pending, self.options.max_pending_requests
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(EngineCommand::Send {
                request: Request::new(request_id, method, params),
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        let request_timeout = self.options.request_timeout;
        match timeout(request_timeout, response_rx).await {
            // A dropped sender means the event loop is gone.
            Ok(received) => received?,
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(EngineCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    async fn subscribe(&self, method: &str, params: Value) -> Result<SubscriptionStream> {
        let result = self.request(method, params).await?;
        if result.is_null() {
            return Err(Error::subscription(format!(
                "{method} returned no subscription id"
            )));
        }

        let key = subscription_key(&result);
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscriptions.lock().register(key.clone(), tx);

        debug!(name = %self.shared.name, method, subscription = %key, "Subscribed");

        Ok(SubscriptionStream::new(key, rx))
    }
}

// ============================================================================
// WebSocketEngine - Event Loop
// ============================================================================

impl WebSocketEngine {
    /// Event loop that owns the socket for the lifetime of the engine.
    async fn run_event_loop(
        shared: Arc<Shared>,
        mut command_rx: mpsc::UnboundedReceiver<EngineCommand>,
        options: EngineOptions,
    ) {
        let mut outbox = Outbox::new();
        let mut active = true;
        let mut attempt: u32 = 0;

        loop {
            if !active {
                shared.transition(ConnectionState::NotConnected);

                let command = command_rx.recv().await;
                match Self::handle_offline_command(command, &shared, &mut outbox) {
                    Control::Continue | Control::Disconnect => {}
                    Control::Connect => {
                        active = true;
                        attempt = 0;
                    }
                    Control::Reconnect(url) => {
                        shared.set_url(url);
                        active = true;
                        attempt = 0;
                    }
                    Control::Dropped => break,
                }
                continue;
            }

            attempt = attempt.saturating_add(1);
            shared.transition(ConnectionState::Connecting { attempt });
            let url = shared.url();

            let outcome =
                Self::connect(&url, &options, &shared, &mut command_rx, &mut outbox).await;

            let control = match outcome {
                ConnectOutcome::Connected(ws_stream) => {
                    info!(name = %shared.name, url = %url, attempt, "Connected");
                    shared.transition(ConnectionState::Connected);

                    let opened = Instant::now();
                    let control =
                        Self::run_session(*ws_stream, &shared, &mut command_rx, &mut outbox).await;

                    shared.fail_pending();
                    shared.subscriptions.lock().clear();

                    match control {
                        // Lost after a stable session: reconnect from attempt 1.
                        Control::Continue if opened.elapsed() >= options.backoff_cap => {
                            attempt = 0;
                            Control::Continue
                        }
                        Control::Continue => {
                            warn!(name = %shared.name, url = %url, attempt, "Session dropped early");
                            shared.transition(ConnectionState::WaitingReconnection { attempt });
                            let delay = options.backoff_delay(attempt);
                            Self::wait_backoff(delay, &shared, &mut command_rx, &mut outbox).await
                        }
                        control => control,
                    }
                }
                ConnectOutcome::Failed => {
                    shared.transition(ConnectionState::WaitingReconnection { attempt });
                    let delay = options.backoff_delay(attempt);
                    Self::wait_backoff(delay, &shared, &mut command_rx, &mut outbox).await
                }
                ConnectOutcome::Interrupted(control) => control,
            };

            match control {
                Control::Continue | Control::Connect => {}
                Control::Disconnect => {
                    active = false;
                    attempt = 0;
                    Self::fail_outbox(&mut outbox);
                }
                Control::Reconnect(url) => {
                    info!(name = %shared.name, from = %shared.url(), to = %url, "Reconnecting");
                    shared.set_url(url);
                    attempt = 0;
                }
                Control::Dropped => break,
            }
        }

        Self::fail_outbox(&mut outbox);
        shared.fail_pending();
        shared.subscriptions.lock().clear();

        debug!(name = %shared.name, "Event loop terminated");
    }

    /// Runs one connect attempt while still serving commands.
    async fn connect(
        url: &Url,
        options: &EngineOptions,
        shared: &Shared,
        command_rx: &mut mpsc::UnboundedReceiver<EngineCommand>,
        outbox: &mut Outbox,
    ) -> ConnectOutcome {
        let handshake = Self::handshake(url, options.connect_timeout);
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                result = &mut handshake => {
                    return match result {
                        Ok(ws_stream) => ConnectOutcome::Connected(Box::new(ws_stream)),
                        Err(e) => {
                            warn!(name = %shared.name, url = %url, error = %e, "Connect failed");
                            ConnectOutcome::Failed
                        }
                    };
                }

                command = command_rx.recv() => {
                    match Self::handle_offline_command(command, shared, outbox) {
                        Control::Continue | Control::Connect => {}
                        control => return ConnectOutcome::Interrupted(control),
                    }
                }
            }
        }
    }

    /// Opens a socket to `url` within `connect_timeout`.
    async fn handshake(url: &Url, connect_timeout: Duration) -> Result<WsStream> {
        match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(result) => Ok(result?.0),
            Err(_) => Err(Error::connection_timeout(
                connect_timeout.as_millis() as u64,
            )),
        }
    }

    /// Sleeps before the next attempt while still serving commands.
    async fn wait_backoff(
        delay: Duration,
        shared: &Shared,
        command_rx: &mut mpsc::UnboundedReceiver<EngineCommand>,
        outbox: &mut Outbox,
    ) -> Control {
        trace!(name = %shared.name, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");

        let timer = sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Control::Continue,

                command = command_rx.recv() => {
                    match Self::handle_offline_command(command, shared, outbox) {
                        Control::Continue | Control::Connect => {}
                        control => return control,
                    }
                }
            }
        }
    }

    /// Serves an open socket until it closes or a command ends the session.
    async fn run_session(
        ws_stream: WsStream,
        shared: &Shared,
        command_rx: &mut mpsc::UnboundedReceiver<EngineCommand>,
        outbox: &mut Outbox,
    ) -> Control {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        for (request, response_tx) in std::mem::take(outbox) {
            Self::handle_send_command(request, response_tx, &mut ws_write, shared).await;
        }

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, shared);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(name = %shared.name, "WebSocket closed by remote");
                            return Control::Continue;
                        }

                        Some(Err(e)) => {
                            warn!(name = %shared.name, error = %e, "WebSocket error");
                            return Control::Continue;
                        }

                        None => {
                            debug!(name = %shared.name, "WebSocket stream ended");
                            return Control::Continue;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(request, response_tx, &mut ws_write, shared)
                                .await;
                        }

                        Some(EngineCommand::RemoveCorrelation(request_id)) => {
                            shared.correlation.lock().remove(&request_id);
                            debug!(request_id, "Removed timed-out correlation");
                        }

                        Some(EngineCommand::Connect) => {}

                        Some(EngineCommand::Disconnect) => {
                            let _ = ws_write.close().await;
                            return Control::Disconnect;
                        }

                        Some(EngineCommand::Reconnect(url)) => {
                            let _ = ws_write.close().await;
                            return Control::Reconnect(url);
                        }

                        None => {
                            let _ = ws_write.close().await;
                            return Control::Dropped;
                        }
                    }
                }
            }
        }
    }

    /// Handles a command received while no socket is open.
    fn handle_offline_command(
        command: Option<EngineCommand>,
        shared: &Shared,
        outbox: &mut Outbox,
    ) -> Control {
        match command {
            None => Control::Dropped,
            Some(EngineCommand::Connect) => Control::Connect,
            Some(EngineCommand::Disconnect) => Control::Disconnect,
            Some(EngineCommand::Reconnect(url)) => Control::Reconnect(url),
            Some(EngineCommand::Send {
                request,
                response_tx,
            }) => {
                trace!(name = %shared.name, request_id = request.id, "Request queued until connected");
                outbox.push((request, response_tx));
                Control::Continue
            }
            Some(EngineCommand::RemoveCorrelation(request_id)) => {
                outbox.retain(|(request, _)| request.id != request_id);
                shared.correlation.lock().remove(&request_id);
                Control::Continue
            }
        }
    }

    /// Handles an incoming text message from the node.
    fn handle_incoming_message(text: &str, shared: &Shared) {
        match from_str::<Incoming>(text) {
            Ok(Incoming::Response(response)) => {
                let tx = shared.correlation.lock().remove(&response.id);

                match tx {
                    Some(tx) => {
                        let _ = tx.send(response.into_result());
                    }
                    None => warn!(id = response.id, "Response for unknown request"),
                }
            }

            Ok(Incoming::Notification(notification)) => {
                let key = notification.subscription_key();
                shared
                    .subscriptions
                    .lock()
                    .route(key, notification.params.result);
            }

            Err(e) => warn!(error = %e, text = %text, "Failed to parse incoming message"),
        }
    }

    /// Writes a request to the socket.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Value>>,
        ws_write: &mut WsSink,
        shared: &Shared,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        shared.correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await
            && let Some(tx) = shared.correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::connection(format!("send failed: {e}"))));
        }

        trace!(request_id, method = %request.method, "Request sent");
    }

    /// Fails requests that never reached a socket.
    fn fail_outbox(outbox: &mut Outbox) {
        for (_, tx) in outbox.drain(..) {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
