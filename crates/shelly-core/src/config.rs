// ── Runtime device configuration ──
//
// These types describe *how* to reach one Shelly device. They carry
// credential data and timeouts, but never touch disk. The host (or
// `shelly-config`) constructs a `DeviceConfig` and hands it in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shelly_api::gen2::GEN2_USERNAME;
use shelly_api::transport::DEFAULT_HTTP_TIMEOUT;
use shelly_api::websocket::DEFAULT_RPC_TIMEOUT;
use shelly_api::{Credentials, TransportConfig, WsConfig};
use url::Url;

use crate::error::CoreError;

/// Default Gen1 username when a password is configured without one.
pub const GEN1_DEFAULT_USERNAME: &str = "admin";

/// Device API generation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Generation {
    /// CoAP multicast + plain HTTP, Basic auth.
    Gen1,
    /// HTTP-RPC and WebSocket-RPC, Digest auth.
    Gen2,
}

/// Everything needed to talk to one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Stable identifier chosen by the host.
    pub id: String,
    /// `host`, `host:port`, or a full `http://` URL.
    pub address: String,
    pub generation: Generation,
    /// Gen1 only. Gen2 devices always authenticate as `admin`.
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub http_timeout: Duration,
    pub rpc_timeout: Duration,
}

impl DeviceConfig {
    pub fn new(id: impl Into<String>, address: impl Into<String>, generation: Generation) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            generation,
            username: None,
            password: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// HTTP base URL derived from `address`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let raw = if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}/", self.address)
        };
        Url::parse(&raw).map_err(|e| CoreError::Config {
            message: format!("device '{}' has invalid address '{}': {e}", self.id, self.address),
        })
    }

    /// Credentials for the HTTP clients, if a password is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let password = self.password.as_ref()?;
        let username = match self.generation {
            Generation::Gen1 => self.username.as_deref().unwrap_or(GEN1_DEFAULT_USERNAME),
            Generation::Gen2 => GEN2_USERNAME,
        };
        Some(Credentials::new(username, password.expose_secret()))
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.http_timeout)
    }

    /// WebSocket settings for a Gen2 device.
    pub fn ws_config(&self) -> Result<WsConfig, CoreError> {
        let base = self.base_url()?;
        let host = base.host_str().ok_or_else(|| CoreError::Config {
            message: format!("device '{}' address has no host", self.id),
        })?;
        let authority = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let mut config = WsConfig::for_address(&authority)?.with_timeout(self.rpc_timeout);
        if let Some(password) = &self.password {
            config = config.with_password(password.expose_secret());
        }
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn generation_parses_case_insensitively() {
        assert_eq!("Gen2".parse::<Generation>().unwrap(), Generation::Gen2);
        assert_eq!(Generation::Gen1.to_string(), "gen1");
    }

    #[test]
    fn bare_host_becomes_http_url() {
        let config = DeviceConfig::new("plug", "192.168.1.20", Generation::Gen1);
        assert_eq!(config.base_url().unwrap().as_str(), "http://192.168.1.20/");
    }

    #[test]
    fn gen2_always_uses_admin() {
        let config = DeviceConfig::new("plus", "10.0.0.5:8080", Generation::Gen2)
            .with_username("ignored")
            .with_password(SecretString::from("pw"));
        assert_eq!(config.credentials().unwrap().username, "admin");

        let ws = config.ws_config().unwrap();
        assert_eq!(ws.url.as_str(), "ws://10.0.0.5:8080/rpc");
        assert!(ws.credentials.is_some());
    }

    #[test]
    fn no_password_means_no_credentials() {
        let config = DeviceConfig::new("plug", "plug.local", Generation::Gen1).with_username("u");
        assert!(config.credentials().is_none());
    }
}
