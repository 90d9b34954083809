//! Push socket with auto-reconnect.
//!
//! [`ConnectionManager`] keeps at most one live WebSocket per credential,
//! fans every inbound JSON frame out to all current [`Subscription`]s, and
//! reconnects with capped exponential backoff after transport failures.
//!
//! A close frame carrying the reserved rejection code (4001 by default)
//! is the one failure that is never retried: the manager moves to
//! [`ConnectionState::ClosedPermanently`] and stays there until an explicit
//! [`connect`](ConnectionManager::connect) with a fresh credential.
//!
//! # Example
//!
//! ```rust,ignore
//! use school_api::websocket::{ConnectionManager, ReconnectConfig};
//!
//! let manager = ConnectionManager::new(ws_url, ReconnectConfig::default());
//! let mut sub = manager.subscribe();
//! manager.connect(&credential);
//!
//! while let Some(msg) = sub.recv().await {
//!     println!("{:?}: {}", msg.kind, msg.to_value());
//! }
//!
//! manager.disconnect();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;

/// Close code the server uses to say "this credential will never be accepted".
pub const DEFAULT_REJECTION_CLOSE_CODE: u16 = 4001;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, and none scheduled.
    Disconnected,
    /// Handshake in flight, or waiting out a backoff delay before the next one.
    Connecting,
    /// Socket established; frames flow both ways.
    Open,
    /// The server rejected the credential. Terminal: no reconnect is scheduled.
    ClosedPermanently,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ClosedPermanently)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub base_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Close code that marks a permanent authentication rejection.
    pub rejection_close_code: u16,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            rejection_close_code: DEFAULT_REJECTION_CLOSE_CODE,
        }
    }
}

// ── Backoff ──────────────────────────────────────────────────────────

/// Doubling delay between reconnect attempts.
///
/// Holds `base <= current <= max` at all times. [`next_delay`](Self::next_delay)
/// hands out the current delay and doubles it for the following attempt;
/// [`reset`](Self::reset) returns to `base` after a successful open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        let base = config.base_delay;
        let max = config.max_delay.max(base);
        Self {
            current: base,
            base,
            max,
        }
    }

    /// Delay the next attempt will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the delay for this attempt and double it for the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

// ── InboundMessage ───────────────────────────────────────────────────

/// A parsed frame from the push socket.
///
/// Every frame is a JSON object with an optional `type` discriminator.
/// All other fields are kept in `fields`, so nothing the server sends is
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Discriminator, e.g. `"notification"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// All remaining fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InboundMessage {
    /// Parse a text frame. Anything but a JSON object is malformed.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Whether the frame carries the given `type`.
    pub fn is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// Look up a field other than `type`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The frame as a single JSON object, `type` included.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        if let Some(ref kind) = self.kind {
            object.insert("type".into(), Value::String(kind.clone()));
        }
        Value::Object(object)
    }
}

// ── Subscriber registry ──────────────────────────────────────────────

type FrameSender = mpsc::UnboundedSender<Arc<InboundMessage>>;

/// Publish/subscribe fan-out. Each subscriber owns an unbounded queue, so
/// a slow or vanished consumer never holds up delivery to the others.
#[derive(Default)]
struct SubscriberRegistry {
    next_id: AtomicU64,
    senders: Mutex<Vec<(u64, FrameSender)>>,
}

impl SubscriberRegistry {
    fn add(&self) -> (u64, mpsc::UnboundedReceiver<Arc<InboundMessage>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push((id, tx));
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Deliver to every live subscriber in registration order. Returns
    /// how many received the frame; closed receivers are pruned.
    fn publish(&self, message: &Arc<InboundMessage>) -> usize {
        let mut senders = self.lock();
        senders.retain(|(_, tx)| tx.send(Arc::clone(message)).is_ok());
        senders.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, FrameSender)>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live registration with the [`ConnectionManager`].
///
/// Receives every inbound frame in arrival order for as long as it is
/// held. Dropping it (or calling [`unsubscribe`](Self::unsubscribe))
/// deregisters exactly this listener.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Arc<InboundMessage>>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    /// Wait for the next frame. Returns `None` once the manager is gone.
    pub async fn recv(&mut self) -> Option<Arc<InboundMessage>> {
        self.rx.recv().await
    }

    /// Take a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<InboundMessage>> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

struct ActiveConnection {
    credential: SecretString,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
}

struct Inner {
    ws_url: Url,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    /// Identifies the current connection loop; writes from older loops are ignored.
    epoch: AtomicU64,
    subscribers: Arc<SubscriberRegistry>,
    active: Mutex<Option<ActiveConnection>>,
    rejection: Mutex<Option<(u16, String)>>,
}

impl Inner {
    fn set_state(&self, epoch: u64, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActiveConnection>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the single push socket for a session.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager for the given socket endpoint. Does NOT connect.
    pub fn new(ws_url: Url, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                ws_url,
                reconnect,
                state,
                epoch: AtomicU64::new(0),
                subscribers: Arc::new(SubscriberRegistry::default()),
                active: Mutex::new(None),
                rejection: Mutex::new(None),
            }),
        }
    }

    /// The socket endpoint, without credentials.
    pub fn url(&self) -> &Url {
        &self.inner.ws_url
    }

    /// Open the socket for `credential` and keep it open.
    ///
    /// No-op while a connection for the same credential is open or being
    /// (re)established. A connection for any other credential is closed
    /// first. Must be called from within a Tokio runtime.
    pub fn connect(&self, credential: &SecretString) {
        let mut active = self.inner.active();

        if let Some(existing) = active.as_ref() {
            let same = existing.credential.expose_secret() == credential.expose_secret();
            let live = matches!(
                *self.inner.state.borrow(),
                ConnectionState::Open | ConnectionState::Connecting
            );
            if same && live {
                debug!("socket already active for this credential");
                return;
            }
            debug!("replacing socket for a different or stale credential");
            existing.cancel.cancel();
        }

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        *active = Some(ActiveConnection {
            credential: credential.clone(),
            cancel: cancel.clone(),
            outbound,
        });
        drop(active);

        self.inner
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.set_state(epoch, ConnectionState::Connecting);

        tokio::spawn(connection_loop(
            Arc::clone(&self.inner),
            epoch,
            credential.clone(),
            cancel,
            outbound_rx,
        ));
    }

    /// Close the socket deliberately and cancel any pending reconnect.
    ///
    /// A permanently closed connection stays `ClosedPermanently`; only a new
    /// [`connect`](Self::connect) leaves that state.
    pub fn disconnect(&self) {
        if let Some(active) = self.inner.active().take() {
            active.cancel.cancel();
            debug!("socket disconnected");
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_if_modified(|current| {
            if current.is_terminal() || *current == ConnectionState::Disconnected {
                return false;
            }
            *current = ConnectionState::Disconnected;
            true
        });
    }

    /// Register a listener for every inbound frame.
    pub fn subscribe(&self) -> Subscription {
        let (id, rx) = self.inner.subscribers.add();
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Transmit a frame if the socket is open.
    ///
    /// Returns `false` when the frame was discarded. Nothing is queued for
    /// later delivery.
    pub fn send(&self, message: &Value) -> bool {
        if self.state() != ConnectionState::Open {
            debug!("socket not open, discarding outbound frame");
            return false;
        }
        self.inner
            .active()
            .as_ref()
            .is_some_and(|active| active.outbound.send(message.to_string()).is_ok())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The rejection that closed the socket permanently, if that happened.
    pub fn rejection(&self) -> Option<Error> {
        self.inner
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map(|(code, reason)| Error::SessionRejected { code, reason })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(active) = self.inner.active().take() {
            active.cancel.cancel();
        }
    }
}

/// Derive the socket endpoint from the server base URL
/// (`https` becomes `wss`, `http` becomes `ws`).
pub fn websocket_url(base: &Url, path: &str) -> Result<Url, Error> {
    let mut url = base.join(path)?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => other,
    }
    .to_owned();
    url.set_scheme(&scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use scheme {scheme} for {url}")))?;
    Ok(url)
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended without a transport error.
#[derive(Debug, PartialEq, Eq)]
enum Closed {
    /// Server closed normally or the stream ended. Reconnect.
    Dropped,
    /// Server closed with the rejection code. Never reconnect.
    Rejected { code: u16, reason: String },
    /// `disconnect()` was called. A close frame has been sent.
    Cancelled,
}

/// How long a deliberate close waits for the close frame to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Main loop: connect → read → on close or error, back off → reconnect.
async fn connection_loop(
    inner: Arc<Inner>,
    epoch: u64,
    credential: SecretString,
    cancel: CancellationToken,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut backoff = Backoff::new(&inner.reconnect);

    loop {
        let result =
            connect_and_read(&inner, epoch, &credential, &cancel, &mut outbound, &mut backoff).await;

        match result {
            Ok(Closed::Cancelled) => break,
            Ok(Closed::Rejected { code, reason }) => {
                warn!(code, reason = %reason, "server rejected the session, not reconnecting");
                *inner
                    .rejection
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some((code, reason));
                inner.set_state(epoch, ConnectionState::ClosedPermanently);
                return;
            }
            Ok(Closed::Dropped) => info!("socket closed, reconnecting"),
            Err(e) => warn!(error = %e, "socket failure"),
        }

        inner.set_state(epoch, ConnectionState::Connecting);
        let delay = backoff.next_delay();
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("connection loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one socket and pump frames until it closes.
async fn connect_and_read(
    inner: &Inner,
    epoch: u64,
    credential: &SecretString,
    cancel: &CancellationToken,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    backoff: &mut Backoff,
) -> Result<Closed, Error> {
    info!(url = %inner.ws_url, "connecting push socket");

    let mut url = inner.ws_url.clone();
    url.query_pairs_mut()
        .append_pair("token", credential.expose_secret());

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Closed::Cancelled),
        connected = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri)) => {
            connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    backoff.reset();
    // Frames accepted before this connection existed are not delivered.
    while outbound.try_recv().is_ok() {}
    inner.set_state(epoch, ConnectionState::Open);
    info!("push socket open");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                match tokio::time::timeout(CLOSE_TIMEOUT, write.send(Message::Close(None))).await {
                    Ok(Ok(())) => debug!("close frame sent"),
                    Ok(Err(e)) => debug!(error = %e, "could not send close frame"),
                    Err(_) => debug!("timed out sending close frame"),
                }
                return Ok(Closed::Cancelled);
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(text.as_str(), &inner.subscribers);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(classify_close(
                            frame.as_ref(),
                            inner.reconnect.rejection_close_code,
                        ));
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("ignoring binary frame");
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong -- tungstenite answers pings itself
                        trace!("control frame");
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        info!("socket stream ended");
                        return Ok(Closed::Dropped);
                    }
                }
            }
            Some(text) = outbound.recv() => {
                write
                    .send(Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
        }
    }
}

fn classify_close(frame: Option<&CloseFrame>, rejection_code: u16) -> Closed {
    match frame {
        Some(cf) => {
            let code = u16::from(cf.code);
            info!(code, reason = %cf.reason.as_str(), "close frame received");
            if code == rejection_code {
                Closed::Rejected {
                    code,
                    reason: cf.reason.as_str().to_owned(),
                }
            } else {
                Closed::Dropped
            }
        }
        None => {
            info!("close frame received (no payload)");
            Closed::Dropped
        }
    }
}

/// Parse a text frame and hand it to every subscriber.
/// Unparseable frames are logged and dropped; the socket stays up.
fn dispatch_frame(text: &str, subscribers: &SubscriberRegistry) {
    match InboundMessage::parse(text) {
        Ok(message) => {
            let delivered = subscribers.publish(&Arc::new(message));
            trace!(delivered, "frame dispatched");
        }
        Err(e) => {
            debug!(error = %e, "dropping malformed frame");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    fn config() -> ReconnectConfig {
        ReconnectConfig::default()
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.rejection_close_code, 4001);
    }

    #[test]
    fn backoff_doubles_from_base() {
        let mut backoff = Backoff::new(&config());
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let mut backoff = Backoff::new(&config());
        let delays: Vec<Duration> = (0..10).map(|_| backoff.next_delay()).collect();

        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0], "delays must not decrease: {delays:?}");
        }
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
        assert_eq!(delays[9], Duration::from_secs(30));
        assert_eq!(backoff.current(), Duration::from_secs(30));
    }

    #[test]
    fn backoff_resets_to_base() {
        let mut backoff = Backoff::new(&config());
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_clamps_inverted_bounds() {
        let mut backoff = Backoff::new(&ReconnectConfig {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(2),
            rejection_close_code: 4001,
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn parse_typed_message() {
        let msg = InboundMessage::parse(
            r#"{"type":"notification","id":7,"message":"Fee due"}"#,
        )
        .unwrap();
        assert!(msg.is("notification"));
        assert_eq!(msg.get("id"), Some(&Value::from(7)));
        assert_eq!(msg.to_value()["type"], "notification");
    }

    #[test]
    fn parse_untyped_object() {
        let msg = InboundMessage::parse(r#"{"echo":{"ping":1}}"#).unwrap();
        assert!(msg.kind.is_none());
        assert!(msg.get("echo").is_some());
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(matches!(
            InboundMessage::parse("not json at all"),
            Err(Error::MalformedMessage(_))
        ));
        assert!(InboundMessage::parse("[1,2,3]").is_err());
        assert!(InboundMessage::parse("42").is_err());
    }

    #[test]
    fn close_with_rejection_code_is_permanent() {
        let frame = CloseFrame {
            code: CloseCode::from(4001),
            reason: "invalid token".into(),
        };
        assert_eq!(
            classify_close(Some(&frame), 4001),
            Closed::Rejected {
                code: 4001,
                reason: "invalid token".into()
            }
        );
    }

    #[test]
    fn other_close_codes_are_transient() {
        let policy = CloseFrame {
            code: CloseCode::Policy,
            reason: "".into(),
        };
        assert_eq!(classify_close(Some(&policy), 4001), Closed::Dropped);
        assert_eq!(classify_close(None, 4001), Closed::Dropped);
    }

    #[test]
    fn registry_delivers_to_every_subscriber_in_order() {
        let registry = SubscriberRegistry::default();
        let (_, mut a) = registry.add();
        let (_, mut b) = registry.add();

        dispatch_frame(r#"{"type":"x","n":1}"#, &registry);
        dispatch_frame(r#"{"type":"x","n":2}"#, &registry);

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap().get("n"), Some(&Value::from(1)));
            assert_eq!(rx.try_recv().unwrap().get("n"), Some(&Value::from(2)));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn registry_prunes_dropped_receivers_without_blocking_others() {
        let registry = SubscriberRegistry::default();
        let (_, gone) = registry.add();
        let (_, mut alive) = registry.add();
        drop(gone);

        dispatch_frame(r#"{"type":"x"}"#, &registry);

        assert!(alive.try_recv().is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn malformed_frame_reaches_nobody() {
        let registry = SubscriberRegistry::default();
        let (_, mut rx) = registry.add();
        dispatch_frame("{oops", &registry);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_removes_exactly_one_listener() {
        let manager = ConnectionManager::new(
            Url::parse("ws://127.0.0.1:9/ws").unwrap(),
            config(),
        );
        let first = manager.subscribe();
        let _second = manager.subscribe();
        assert_eq!(manager.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(manager.subscriber_count(), 1);
    }

    #[test]
    fn send_is_discarded_when_not_open() {
        let manager = ConnectionManager::new(
            Url::parse("ws://127.0.0.1:9/ws").unwrap(),
            config(),
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.send(&serde_json::json!({"type": "ping"})));
    }

    #[test]
    fn websocket_url_follows_base_scheme() {
        let secure = websocket_url(&Url::parse("https://school.example.com").unwrap(), "/ws").unwrap();
        assert_eq!(secure.as_str(), "wss://school.example.com/ws");

        let plain = websocket_url(&Url::parse("http://localhost:8000/").unwrap(), "/ws").unwrap();
        assert_eq!(plain.as_str(), "ws://localhost:8000/ws");
    }
}
