//! Persistent WebSocket RPC connection to one Gen2 device.
//!
//! Requests are correlated to responses by id, so the device may answer
//! out of order. Each request carries its own timeout timer; the pending
//! map guarantees that exactly one of response, error, timeout or
//! disconnect settles it. Unsolicited `Notify*` frames are decoded and
//! fanned out through a [`tokio::sync::broadcast`] channel in the order
//! they arrive.
//!
//! Devices with authentication enabled answer the first request with an
//! RPC error 401 carrying a realm/nonce. The client computes a digest
//! session once, resends the same request with an `auth` block, and
//! attaches that block to every later request on the connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelly_api::websocket::{WsConfig, WsEvent, WsRpcClient};
//!
//! let config = WsConfig::for_address("192.168.1.30")?.with_password("secret");
//! let client = WsRpcClient::new(config);
//! let mut events = client.subscribe();
//! client.connect().await?;
//!
//! let status = client.read_states().await?;
//! while let Ok(WsEvent::Message(note)) = events.recv().await {
//!     println!("{note:?}");
//! }
//! client.disconnect().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{Credentials, DigestAlgorithm};
use crate::error::Error;
use crate::gen2::client::GEN2_USERNAME;
use crate::gen2::component::{ComponentCommand, is_write_method};
use crate::gen2::models::{Gen2DeviceConfig, Gen2DeviceInfo, Gen2DeviceStatus, Notification};
use crate::models::WireValue;
use crate::schema::{Schema, SchemaValidator, StructuralValidator};

// ── Constants ────────────────────────────────────────────────────────

/// Default wait for a response before a request is rejected.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Placeholder hashed as HA2: the socket has no HTTP method or URI.
const WS_DIGEST_HA2_INPUT: &str = "dummy_method:dummy_uri";

// ── Configuration ────────────────────────────────────────────────────

/// Connection settings for one device socket.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Socket URL, normally `ws://<address>/rpc`.
    pub url: Url,
    /// Value of the `src` field on outbound frames.
    pub source: String,
    pub credentials: Option<Credentials>,
    /// Applies to every request on this connection.
    pub request_timeout: Duration,
}

impl WsConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            source: format!("shelly-api-{}", Uuid::new_v4().simple()),
            credentials: None,
            request_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    /// `ws://<address>/rpc`
    pub fn for_address(address: &str) -> Result<Self, Error> {
        Ok(Self::new(Url::parse(&format!("ws://{address}/rpc"))?))
    }

    /// Authenticate as the Gen2 admin account.
    #[must_use]
    pub fn with_password(mut self, password: &str) -> Self {
        self.credentials = Some(Credentials::new(GEN2_USERNAME, password));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ── Public state and events ──────────────────────────────────────────

/// Lifecycle of the socket.
///
/// `Lost` is only entered when the transport fails while connected and is
/// always followed by `Disconnected`; a clean close goes straight to
/// `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Lost,
}

/// Broadcast to every subscriber.
#[derive(Debug, Clone)]
pub enum WsEvent {
    Message(Arc<Notification>),
    Error(String),
    Connected,
    Disconnected,
    Lost,
}

// ── Internal state ───────────────────────────────────────────────────

type Outcome = Result<Option<Value>, Error>;

struct PendingRequest {
    method: String,
    params: Option<Value>,
    responder: oneshot::Sender<Outcome>,
    timer: Option<AbortHandle>,
    /// The frame already carried an `auth` block.
    authenticated: bool,
}

impl PendingRequest {
    fn settle(self, outcome: Outcome) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have gone away; nothing to do then.
        let _ = self.responder.send(outcome);
    }
}

/// Digest state shared by every request on one connection.
#[derive(Debug, Clone)]
struct WsSession {
    realm: String,
    username: String,
    /// Echoed back with the type the device used (usually a number).
    nonce: Value,
    cnonce: i64,
    response: String,
    nc: u32,
    algorithm: DigestAlgorithm,
}

impl WsSession {
    fn new(credentials: &Credentials, challenge: &SocketChallenge, cnonce: i64) -> Self {
        let algorithm = DigestAlgorithm::Sha256;
        let nc = 1;
        let nonce = match &challenge.nonce {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let ha1 = algorithm.ha1(credentials, &challenge.realm);
        let ha2 = algorithm.hash(WS_DIGEST_HA2_INPUT);
        let response = algorithm.response(&ha1, &nonce, &nc.to_string(), &cnonce.to_string(), &ha2);

        Self {
            realm: challenge.realm.clone(),
            username: credentials.username.clone(),
            nonce: challenge.nonce.clone(),
            cnonce,
            response,
            nc,
            algorithm,
        }
    }

    fn auth_block(&self) -> AuthBlock<'_> {
        AuthBlock {
            realm: &self.realm,
            username: &self.username,
            nonce: &self.nonce,
            cnonce: self.cnonce,
            response: &self.response,
            nc: self.nc,
            algorithm: self.algorithm.as_str(),
        }
    }
}

struct Connection {
    /// Distinguishes this socket from earlier ones on the same handle.
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct WsInner {
    config: WsConfig,
    validator: Arc<dyn SchemaValidator>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<WsEvent>,
    pending: DashMap<String, PendingRequest>,
    session: Mutex<Option<WsSession>>,
    connection: Mutex<Option<Connection>>,
    /// Serializes `connect` so one handle never opens two sockets.
    connecting: tokio::sync::Mutex<()>,
    generations: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Wire frames ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct OutboundFrame<'a> {
    id: &'a str,
    src: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<AuthBlock<'a>>,
}

#[derive(Serialize)]
struct AuthBlock<'a> {
    realm: &'a str,
    username: &'a str,
    nonce: &'a Value,
    cnonce: i64,
    response: &'a str,
    nc: u32,
    algorithm: &'a str,
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    /// `Some(Value::Null)` when the device sent `"result": null`.
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Realm/nonce embedded as JSON text in a 401 error message.
#[derive(Debug, Deserialize)]
struct SocketChallenge {
    realm: String,
    nonce: Value,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn frame_id(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn schema_for(method: &str) -> Option<Schema> {
    match method {
        "Shelly.GetDeviceInfo" => Some(Schema::Gen2DeviceInfo),
        "Shelly.GetConfig" => Some(Schema::Gen2DeviceConfig),
        "Shelly.GetStatus" => Some(Schema::Gen2DeviceStatus),
        _ => None,
    }
}

// ── WsRpcClient ──────────────────────────────────────────────────────

/// Handle to one device socket. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct WsRpcClient {
    inner: Arc<WsInner>,
}

impl WsRpcClient {
    pub fn new(config: WsConfig) -> Self {
        Self::with_validator(config, Arc::new(StructuralValidator))
    }

    pub fn with_validator(config: WsConfig, validator: Arc<dyn SchemaValidator>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(WsInner {
                config,
                validator,
                state,
                events,
                pending: DashMap::new(),
                session: Mutex::new(None),
                connection: Mutex::new(None),
                connecting: tokio::sync::Mutex::new(()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive notifications and lifecycle events. Lagging receivers get
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.inner.events.subscribe()
    }

    /// Requests sent and not yet settled.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the socket and start the reader/writer tasks.
    ///
    /// Returns immediately if already connected. Concurrent callers wait
    /// for the attempt in flight and share its socket.
    pub async fn connect(&self) -> Result<(), Error> {
        let _attempt = self.inner.connecting.lock().await;
        if lock(&self.inner.connection).is_some() {
            return Ok(());
        }

        let url = self.inner.config.url.clone();
        self.inner.set_state(ConnectionState::Connecting);
        info!(url = %url, "Connecting to device socket");

        let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let message = e.to_string();
                warn!(url = %url, error = %message, "Device socket connect failed");
                self.inner.set_state(ConnectionState::Disconnected);
                self.inner.emit(WsEvent::Error(message.clone()));
                return Err(Error::WebSocketConnect(message));
            }
        };

        let (mut write, mut read) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let cancel = CancellationToken::new();
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;

        // Must be in place before the reader can tear it down.
        *lock(&self.inner.connection) = Some(Connection {
            generation,
            outbound,
            cancel: cancel.clone(),
            tasks: Vec::new(),
        });
        self.inner.set_state(ConnectionState::Connected);
        self.inner.emit(WsEvent::Connected);
        info!(url = %url, "Device socket connected");

        let writer_cancel = cancel.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = writer_cancel.cancelled() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else { break };
                        if let Err(e) = write.send(msg).await {
                            debug!(error = %e, "Device socket write failed");
                            break;
                        }
                    }
                }
            }
        });

        let reader_cancel = cancel.clone();
        let reader_inner = Arc::clone(&self.inner);
        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = reader_cancel.cancelled() => return,
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => reader_inner.handle_frame(text.as_str()),
                        Some(Ok(Message::Close(frame))) => {
                            info!(close = ?frame, "Device closed the socket");
                            reader_inner.teardown(generation, false);
                            return;
                        }
                        Some(Ok(_)) => trace!("Ignoring non-text frame"),
                        Some(Err(e)) => {
                            warn!(error = %e, "Device socket lost");
                            reader_inner.emit(WsEvent::Error(e.to_string()));
                            reader_inner.teardown(generation, true);
                            return;
                        }
                        None => {
                            info!("Device socket stream ended");
                            reader_inner.teardown(generation, false);
                            return;
                        }
                    },
                }
            }
        });

        match lock(&self.inner.connection).as_mut() {
            Some(connection) if connection.generation == generation => {
                connection.tasks.extend([writer, reader]);
            }
            _ => {
                writer.abort();
                reader.abort();
            }
        }
        Ok(())
    }

    /// Close the socket. Every pending request is rejected with
    /// [`Error::Disconnected`] and the digest session is discarded.
    pub async fn disconnect(&self) {
        let Some(connection) = lock(&self.inner.connection).take() else {
            return;
        };
        connection.cancel.cancel();
        for task in connection.tasks {
            let _ = task.await;
        }
        self.inner.finish_teardown();
        info!(url = %self.inner.config.url, "Device socket disconnected");
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send `method` and wait for its settlement.
    ///
    /// Write methods resolve to `None`; reads resolve to the validated
    /// `result` value.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Option<Value>, Error> {
        let inner = &self.inner;
        let (generation, outbound) = inner.outbound().ok_or(Error::NotConnected)?;

        let id = Uuid::new_v4().to_string();
        let session = lock(&inner.session).clone();
        let frame = inner.encode_frame(&id, method, params.as_ref(), session.as_ref())?;

        let (responder, response) = oneshot::channel();
        inner.enqueue(
            &id,
            generation,
            PendingRequest {
                method: method.to_owned(),
                params,
                responder,
                timer: None,
                authenticated: session.is_some(),
            },
        )?;

        let timer = tokio::spawn(request_timeout(
            Arc::downgrade(inner),
            id.clone(),
            inner.config.request_timeout,
        ))
        .abort_handle();
        if let Some(mut entry) = inner.pending.get_mut(&id) {
            entry.timer = Some(timer);
        }

        debug!(id = %id, method, "RPC request");
        if outbound.send(Message::Text(frame.into())).is_err() {
            if let Some((_, pending)) = inner.pending.remove(&id) {
                pending.settle(Err(Error::NotConnected));
            }
        }

        response.await.unwrap_or(Err(Error::Disconnected))
    }

    /// `Shelly.GetStatus`
    pub async fn read_states(&self) -> Result<Gen2DeviceStatus, Error> {
        self.read("Shelly.GetStatus", Schema::Gen2DeviceStatus).await
    }

    /// `Shelly.GetDeviceInfo`
    pub async fn read_device_info(&self) -> Result<Gen2DeviceInfo, Error> {
        self.read("Shelly.GetDeviceInfo", Schema::Gen2DeviceInfo).await
    }

    /// `Shelly.GetConfig`
    pub async fn read_config(&self) -> Result<Gen2DeviceConfig, Error> {
        self.read("Shelly.GetConfig", Schema::Gen2DeviceConfig).await
    }

    /// Write `value` to the component property `key` (e.g. `switch_0_output`).
    pub async fn write_state(&self, key: &str, value: &WireValue) -> Result<(), Error> {
        let command = ComponentCommand::parse(key, value)?;
        self.call(command.method(), Some(command.params())).await?;
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, method: &str, schema: Schema) -> Result<T, Error> {
        let value = self.call(method, None).await?.ok_or_else(|| Error::Protocol {
            message: format!("{method} returned no result"),
            code: None,
        })?;
        serde_json::from_value(value).map_err(|e| Error::schema(schema.file_name(), e.to_string()))
    }
}

impl std::fmt::Debug for WsRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsRpcClient")
            .field("url", &self.inner.config.url.as_str())
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// Reject `id` with a timeout unless something else settled it first.
async fn request_timeout(inner: Weak<WsInner>, id: String, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    let Some(inner) = inner.upgrade() else { return };
    if let Some((_, pending)) = inner.pending.remove(&id) {
        warn!(id = %id, method = %pending.method, "RPC request timed out");
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let _ = pending.responder.send(Err(Error::Timeout { timeout_ms }));
    }
}

// ── Frame handling ───────────────────────────────────────────────────

impl WsInner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: WsEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn outbound(&self) -> Option<(u64, mpsc::UnboundedSender<Message>)> {
        lock(&self.connection)
            .as_ref()
            .map(|c| (c.generation, c.outbound.clone()))
    }

    fn generation(&self) -> Option<u64> {
        lock(&self.connection).as_ref().map(|c| c.generation)
    }

    /// Track `request` against the socket it is about to be sent on.
    fn enqueue(&self, id: &str, generation: u64, request: PendingRequest) -> Result<(), Error> {
        self.pending.insert(id.to_owned(), request);
        // A teardown that ran before the insert has already drained the map.
        if self.generation() != Some(generation) {
            self.pending.remove(id);
            return Err(Error::Disconnected);
        }
        Ok(())
    }

    fn encode_frame(
        &self,
        id: &str,
        method: &str,
        params: Option<&Value>,
        session: Option<&WsSession>,
    ) -> Result<String, Error> {
        let frame = OutboundFrame {
            id,
            src: &self.config.source,
            method,
            params,
            auth: session.map(WsSession::auth_block),
        };
        serde_json::to_string(&frame).map_err(|e| Error::Protocol {
            message: format!("cannot encode {method} request: {e}"),
            code: None,
        })
    }

    fn handle_frame(&self, text: &str) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Unparseable frame from device");
                self.emit(WsEvent::Error(format!("unparseable frame: {e}")));
                return;
            }
        };

        let Some(id) = frame.id.as_ref().and_then(frame_id) else {
            self.dispatch_notification(frame);
            return;
        };

        match (frame.result, frame.error) {
            (_, Some(error)) if error.code == 401 => self.handle_unauthorized(&id, &error),
            (_, Some(error)) => self.settle(
                &id,
                Err(Error::Protocol {
                    message: error.message,
                    code: Some(error.code),
                }),
            ),
            (Some(result), None) => self.resolve(&id, result),
            (None, None) => self.settle(
                &id,
                Err(Error::Protocol {
                    message: "response carries neither result nor error".into(),
                    code: None,
                }),
            ),
        }
    }

    fn dispatch_notification(&self, frame: InboundFrame) {
        let Some(method) = frame.method else {
            debug!("Frame without id or method ignored");
            return;
        };
        if !Notification::METHODS.contains(&method.as_str()) {
            trace!(method = %method, "Ignoring unsolicited request");
            return;
        }

        let params = frame.params.unwrap_or(Value::Null);
        let decoded = self
            .validator
            .validate(&params.to_string(), Schema::Gen2Notification)
            .and_then(|()| {
                Notification::from_params(&method, frame.src.unwrap_or_default(), params)
                    .map_err(|e| Error::schema(Schema::Gen2Notification.file_name(), e.to_string()))
            });

        match decoded {
            Ok(note) => {
                trace!(method = %method, "Notification");
                self.emit(WsEvent::Message(Arc::new(note)));
            }
            Err(e) => {
                debug!(method = %method, error = %e, "Dropping invalid notification");
                self.emit(WsEvent::Error(e.to_string()));
            }
        }
    }

    fn resolve(&self, id: &str, result: Value) {
        let Some((_, pending)) = self.pending.remove(id) else {
            debug!(id, "Response for unknown or settled request");
            return;
        };

        let outcome = if is_write_method(&pending.method) {
            Ok(None)
        } else {
            match schema_for(&pending.method) {
                Some(schema) => self
                    .validator
                    .validate(&result.to_string(), schema)
                    .map(|()| Some(result)),
                None => Ok(Some(result)),
            }
        };
        debug!(id, method = %pending.method, ok = outcome.is_ok(), "RPC response");
        pending.settle(outcome);
    }

    fn settle(&self, id: &str, outcome: Outcome) {
        if let Some((_, pending)) = self.pending.remove(id) {
            pending.settle(outcome);
        }
    }

    /// Answer a 401 for `id`: build the session on first challenge, then
    /// resend the request under the same id with the auth block attached.
    fn handle_unauthorized(&self, id: &str, error: &RpcError) {
        let Some(mut entry) = self.pending.get_mut(id) else {
            return;
        };

        if entry.authenticated {
            drop(entry);
            warn!(id, "Device rejected digest credentials");
            lock(&self.session).take();
            self.settle(
                id,
                Err(Error::Authentication {
                    message: "credentials rejected by device".into(),
                }),
            );
            return;
        }

        let Some(credentials) = self.config.credentials.as_ref() else {
            drop(entry);
            self.settle(
                id,
                Err(Error::Authentication {
                    message: "device requires authentication but no password is configured"
                        .into(),
                }),
            );
            return;
        };

        let session = {
            let mut guard = lock(&self.session);
            if let Some(existing) = guard.as_ref() {
                existing.clone()
            } else {
                let Ok(challenge) = serde_json::from_str::<SocketChallenge>(&error.message) else {
                    drop(guard);
                    drop(entry);
                    self.settle(
                        id,
                        Err(Error::Protocol {
                            message: format!("401 without a usable challenge: {}", error.message),
                            code: Some(error.code),
                        }),
                    );
                    return;
                };
                let session =
                    WsSession::new(credentials, &challenge, chrono::Utc::now().timestamp());
                debug!(realm = %session.realm, "Digest session established");
                *guard = Some(session.clone());
                session
            }
        };

        entry.authenticated = true;
        let frame = self.encode_frame(id, &entry.method, entry.params.as_ref(), Some(&session));
        drop(entry);

        let sent = frame.and_then(|frame| {
            self.outbound()
                .ok_or(Error::NotConnected)?
                .1
                .send(Message::Text(frame.into()))
                .map_err(|_| Error::NotConnected)
        });
        match sent {
            Ok(()) => debug!(id, "Resent request with digest auth"),
            Err(e) => self.settle(id, Err(e)),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Called by the reader when the socket ends on its own. A reader from
    /// an older socket never tears down the current one.
    fn teardown(&self, generation: u64, lost: bool) {
        let connection = {
            let mut guard = lock(&self.connection);
            match guard.as_ref() {
                Some(current) if current.generation == generation => guard.take(),
                _ => None,
            }
        };
        let Some(connection) = connection else {
            return;
        };
        connection.cancel.cancel();
        if lost {
            self.set_state(ConnectionState::Lost);
            self.emit(WsEvent::Lost);
        }
        self.finish_teardown();
    }

    fn finish_teardown(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.settle(&id, Err(Error::Disconnected));
        }
        lock(&self.session).take();
        self.set_state(ConnectionState::Disconnected);
        self.emit(WsEvent::Disconnected);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inner_for_test() -> WsRpcClient {
        WsRpcClient::new(WsConfig::new(Url::parse("ws://127.0.0.1:1/rpc").unwrap()))
    }

    #[test]
    fn socket_session_hashes_placeholder_ha2() {
        let creds = Credentials::new("admin", "secret");
        let challenge = SocketChallenge {
            realm: "shellyplus1-a8032ab12345".into(),
            nonce: json!(1_700_000_000),
        };
        let session = WsSession::new(&creds, &challenge, 42);

        let alg = DigestAlgorithm::Sha256;
        let ha1 = alg.hash("admin:shellyplus1-a8032ab12345:secret");
        let ha2 = alg.hash("dummy_method:dummy_uri");
        let expected = alg.hash(&format!("{ha1}:1700000000:1:42:auth:{ha2}"));
        assert_eq!(session.response, expected);
        assert_eq!(session.nc, 1);
    }

    #[test]
    fn auth_block_keeps_numeric_nonce() {
        let creds = Credentials::new("admin", "secret");
        let challenge = SocketChallenge {
            realm: "r".into(),
            nonce: json!(99),
        };
        let session = WsSession::new(&creds, &challenge, 7);
        let block = serde_json::to_value(session.auth_block()).unwrap();
        assert_eq!(block["nonce"], json!(99));
        assert_eq!(block["cnonce"], json!(7));
        assert_eq!(block["algorithm"], json!("SHA-256"));
        assert_eq!(block["username"], json!("admin"));
    }

    #[test]
    fn inbound_frame_distinguishes_null_result() {
        let frame: InboundFrame = serde_json::from_str(r#"{"id":"a","result":null}"#).unwrap();
        assert_eq!(frame.result, Some(Value::Null));
        let frame: InboundFrame = serde_json::from_str(r#"{"id":"a"}"#).unwrap();
        assert!(frame.result.is_none());
    }

    #[test]
    fn numeric_ids_are_matched_as_text() {
        assert_eq!(frame_id(&json!(12)).as_deref(), Some("12"));
        assert_eq!(frame_id(&json!("abc")).as_deref(), Some("abc"));
        assert!(frame_id(&json!(null)).is_none());
    }

    #[test]
    fn outbound_frame_omits_absent_fields() {
        let client = inner_for_test();
        let text = client
            .inner
            .encode_frame("1", "Shelly.GetStatus", None, None)
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("params").is_none());
        assert!(value.get("auth").is_none());
        assert_eq!(value["method"], json!("Shelly.GetStatus"));
    }

    #[tokio::test]
    async fn call_without_connection_fails_fast() {
        let client = inner_for_test();
        let err = client.call("Shelly.GetStatus", None).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(client.pending_count(), 0);
    }

    fn install(client: &WsRpcClient, generation: u64) -> mpsc::UnboundedReceiver<Message> {
        let (outbound, rx) = mpsc::unbounded_channel();
        *lock(&client.inner.connection) = Some(Connection {
            generation,
            outbound,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        });
        client.inner.set_state(ConnectionState::Connected);
        rx
    }

    fn request() -> (PendingRequest, oneshot::Receiver<Outcome>) {
        let (responder, rx) = oneshot::channel();
        let pending = PendingRequest {
            method: "Shelly.GetStatus".into(),
            params: None,
            responder,
            timer: None,
            authenticated: false,
        };
        (pending, rx)
    }

    #[test]
    fn stale_reader_leaves_newer_socket_alone() {
        let client = inner_for_test();
        let _rx = install(&client, 2);
        let (pending, mut response) = request();
        client.inner.pending.insert("1".into(), pending);

        client.inner.teardown(1, true);
        assert_eq!(client.inner.generation(), Some(2));
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.pending_count(), 1);

        client.inner.teardown(2, false);
        assert!(client.inner.generation().is_none());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(response.try_recv().unwrap(), Err(Error::Disconnected)));
    }

    #[test]
    fn request_enqueued_after_teardown_is_rejected() {
        let client = inner_for_test();
        let _rx = install(&client, 1);
        client.inner.teardown(1, false);

        let (pending, _response) = request();
        let err = client.inner.enqueue("1", 1, pending).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn request_enqueued_on_live_socket_is_tracked() {
        let client = inner_for_test();
        let _rx = install(&client, 3);
        let (pending, _response) = request();
        client.inner.enqueue("1", 3, pending).unwrap();
        assert_eq!(client.pending_count(), 1);
    }

    #[test]
    fn notifications_never_touch_pending_requests() {
        let client = inner_for_test();
        let mut events = client.subscribe();
        let (responder, _rx) = oneshot::channel();
        client.inner.pending.insert(
            "1".into(),
            PendingRequest {
                method: "Shelly.GetStatus".into(),
                params: None,
                responder,
                timer: None,
                authenticated: false,
            },
        );

        client.inner.handle_frame(
            &json!({"src": "dev", "method": "NotifyStatus", "params": {"switch:0": {"output": true}}})
                .to_string(),
        );

        assert_eq!(client.pending_count(), 1);
        assert!(matches!(events.try_recv().unwrap(), WsEvent::Message(_)));
    }
}
