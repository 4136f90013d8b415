// ── Core error types ──
//
// Consumer-facing errors from shelly-core. Hosts never match on reqwest or
// tungstenite failures directly; the `From<shelly_api::Error>` impl folds
// transport-layer errors into these variants while keeping the 4xx / 5xx /
// network classification available.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach device at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Device did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Payload failed schema '{schema}': {message}")]
    SchemaValidation { schema: String, message: String },

    #[error("Device protocol error: {message}")]
    Protocol { message: String, code: Option<i64> },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} (requires {required})")]
    Unsupported { operation: String, required: String },

    /// A component key or block/sensor could not be turned into a device action.
    #[error("Cannot map '{key}' to a device action: {reason}")]
    Mapping { key: String, reason: String },

    /// The value has no device representation under the property's format.
    #[error("Value for '{key}' cannot be written: {reason}")]
    InvalidValue { key: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Device API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// The device answered with a 4xx status or rejected credentials.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Api { status: Some(s), .. } => (400..500).contains(s),
            Self::AuthenticationFailed { .. } => true,
            _ => false,
        }
    }

    /// The device answered with a 5xx status.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status: Some(s), .. } if (500..600).contains(s))
    }

    /// The device could not be reached or the socket went away.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::DeviceDisconnected | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<shelly_api::Error> for CoreError {
    fn from(err: shelly_api::Error) -> Self {
        use shelly_api::Error as Api;

        match err {
            Api::CoapDecode { offset, reason } => CoreError::Protocol {
                message: format!("CoAP decode error at offset {offset}: {reason}"),
                code: None,
            },
            Api::SchemaValidation { schema, message } => {
                CoreError::SchemaValidation { schema, message }
            }
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::ConnectionFailed {
                        address: e
                            .url()
                            .and_then(|u| u.host_str().map(str::to_owned))
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::HttpStatus { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device address: {e}"),
            },
            Api::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            Api::NotConnected | Api::Disconnected => CoreError::DeviceDisconnected,
            Api::Protocol { message, code } => CoreError::Protocol { message, code },
            Api::Mapping { key, reason } => CoreError::Mapping { key, reason },
            Api::Runtime(e) => CoreError::Config {
                message: format!("Cannot start runtime: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_errors_stay_configuration_shaped() {
        let err: CoreError = shelly_api::Error::Mapping {
            key: "light_0_output".into(),
            reason: "no method".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Mapping { .. }));
        assert!(!err.is_network());
    }

    #[test]
    fn http_status_keeps_classification() {
        let err: CoreError = shelly_api::Error::HttpStatus {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn socket_loss_is_network() {
        let err: CoreError = shelly_api::Error::Disconnected.into();
        assert!(err.is_network());
        let err: CoreError = shelly_api::Error::Timeout { timeout_ms: 10_000 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_ms: 10_000 }));
    }
}
