use thiserror::Error;

/// Top-level error type for the `shelly-api` crate.
///
/// Covers every failure mode across both device generations:
/// packet decoding, schema validation, HTTP transport, digest
/// authentication, WebSocket RPC, and component mapping.
/// `shelly-core` maps these into consumer-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Decoding ────────────────────────────────────────────────────
    /// Malformed CoAP option chain. Recovered locally by the decoder,
    /// which drops the packet; never surfaced through `coap::decode`.
    #[error("CoAP decode error at offset {offset}: {reason}")]
    CoapDecode { offset: usize, reason: &'static str },

    /// A payload did not pass the schema check for its message kind.
    #[error("Payload failed schema '{schema}': {message}")]
    SchemaValidation { schema: String, message: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Credentials were rejected after the single challenge-response retry,
    /// or the device demanded auth and none is configured.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status other than an auth challenge.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No response within the wait window.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The socket is not connected; call `connect()` first.
    #[error("WebSocket is not connected")]
    NotConnected,

    /// The connection was closed while the request was in flight.
    #[error("WebSocket disconnected before a response arrived")]
    Disconnected,

    /// The device answered with a frame that fits no known shape,
    /// or with an RPC error object.
    #[error("RPC protocol error: {message}")]
    Protocol { message: String, code: Option<i64> },

    // ── Mapping ─────────────────────────────────────────────────────
    /// A component key or block/sensor pair could not be turned into a
    /// device method or action.
    #[error("Cannot map '{key}' to a device action: {reason}")]
    Mapping { key: String, reason: String },

    // ── Runtime ─────────────────────────────────────────────────────
    /// The blocking facade could not start its runtime.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the device answered with a 4xx status.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => (400..500).contains(status),
            Self::Transport(e) => e.status().is_some_and(|s| s.is_client_error()),
            Self::Authentication { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the device answered with a 5xx status.
    pub fn is_server_error(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => (500..600).contains(status),
            Self::Transport(e) => e.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }

    /// Returns `true` if the device could not be reached at all.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::WebSocketConnect(_) | Self::NotConnected | Self::Disconnected => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying by the host.
    pub fn is_transient(&self) -> bool {
        self.is_network() || self.is_server_error() || matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            schema: schema.into(),
            message: message.into(),
        }
    }

    pub(crate) fn mapping(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
